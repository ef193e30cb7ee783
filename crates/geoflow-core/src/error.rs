use thiserror::Error;

/// The full error taxonomy raised by the engine. Every fallible entry point
/// returns `Result<T, GeoflowError>` so callers can match on kind instead of
/// parsing strings.
#[derive(Debug, Error)]
pub enum GeoflowError {
    #[error("type mismatch: {context}")]
    TypeMismatch { context: String },

    #[error("connecting {from} to {to} would introduce a cycle")]
    CycleDetected { from: String, to: String },

    #[error("no such terminal - \"{terminal}\" in {node}")]
    UnknownTerminal { node: String, terminal: String },

    #[error("no such node - \"{0}\"")]
    UnknownNode(String),

    #[error("no such node type - \"{0}\"")]
    UnknownType(String),

    #[error("global not found - \"{0}\"")]
    GlobalNotFound(String),

    #[error("flowchart error: {0}")]
    FlowchartError(String),

    #[error("io error: {0}")]
    IOError(String),

    #[error("node processing error in \"{node}\": {message}")]
    NodeProcessingError { node: String, message: String },
}

impl From<std::io::Error> for GeoflowError {
    fn from(e: std::io::Error) -> Self {
        GeoflowError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for GeoflowError {
    fn from(e: serde_json::Error) -> Self {
        GeoflowError::FlowchartError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoflowError>;
