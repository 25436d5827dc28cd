//! Error types shared across segmeta crates

use thiserror::Error;

/// Result type alias for segmeta operations
pub type Result<T> = std::result::Result<T, SegmetaError>;

/// Main error type for segmeta
#[derive(Error, Debug)]
pub enum SegmetaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SegmetaError {
    /// Configuration error for an environment variable that failed to parse
    pub fn invalid_env(var: &str, value: &str, expected: &str) -> Self {
        SegmetaError::Config(format!("{var}={value:?} is not a valid {expected}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_env_message() {
        let err = SegmetaError::invalid_env("SEGMETA_FAIL_FAST", "maybe", "boolean");
        assert_eq!(
            err.to_string(),
            "Configuration error: SEGMETA_FAIL_FAST=\"maybe\" is not a valid boolean"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SegmetaError = io.into();
        assert!(matches!(err, SegmetaError::Io(_)));
    }
}
