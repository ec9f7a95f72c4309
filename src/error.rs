//! Error types for the confluence engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the confluence engine
#[derive(Error, Debug)]
pub enum Error {
    // Construction-time errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration entry: {0}")]
    MissingConfigEntry(String),

    // Per-call caller errors
    #[error("Invalid market context: {0}")]
    InvalidContext(String),

    // Recovered locally by the orchestrator, never returned from evaluate
    #[error("Insufficient signal data: {available} usable signals, {required} required")]
    InsufficientData { available: usize, required: usize },

    // Session errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session limit reached: {limit} open sessions")]
    SessionLimit { limit: usize },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error indicates a bug on the caller's side
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Error::InvalidContext(_) | Error::Config(_) | Error::MissingConfigEntry(_)
        )
    }

    /// Check if the engine degrades this condition into a WAIT decision
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidContext("negative volatility".into()).is_caller_bug());
        assert!(Error::Config("bad weights".into()).is_caller_bug());
        assert!(!Error::InsufficientData { available: 1, required: 2 }.is_caller_bug());

        assert!(Error::InsufficientData { available: 0, required: 2 }.is_recoverable());
        assert!(!Error::InvalidContext("x".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::InsufficientData { available: 1, required: 2 };
        assert_eq!(
            err.to_string(),
            "Insufficient signal data: 1 usable signals, 2 required"
        );
    }
}
