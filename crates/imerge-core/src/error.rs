//! Core error types for the imerge compositor.

/// A specialized Result type for imerge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Top-level error type encompassing every failure a merge can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MergeError {
    #[error("fetch error: {message} ({reference})")]
    Fetch { reference: String, message: String },

    #[error("decode error: {message} ({reference})")]
    Decode { reference: String, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MergeError {
    /// Create a fetch error for a reference.
    pub fn fetch(reference: impl Into<String>, message: impl Into<String>) -> Self {
        MergeError::Fetch {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create a decode error for a reference.
    pub fn decode(reference: impl Into<String>, message: impl Into<String>) -> Self {
        MergeError::Decode {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// True for failures that belong to a single image load (fetch or decode).
    pub fn is_load_error(&self) -> bool {
        matches!(self, MergeError::Fetch { .. } | MergeError::Decode { .. })
    }
}

impl From<std::io::Error> for MergeError {
    fn from(e: std::io::Error) -> Self {
        MergeError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for MergeError {
    fn from(e: serde_json::Error) -> Self {
        MergeError::Serialization(e.to_string())
    }
}
