//! Error types for the loader
//!
//! Schema anomalies (foreign records, missing metadata keys, absent titles)
//! are never errors. Only I/O failures and host interruption surface here.

use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Error code reported when a split read is interrupted by the host.
pub const INPUT_READ_ERROR_CODE: u32 = 6018;

/// Message attached to [`INPUT_READ_ERROR_CODE`].
pub const INPUT_READ_ERROR_MESSAGE: &str = "Error while reading input";

/// Which side of the execution environment a coded failure is blamed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// Bad input data
    Input,
    /// Failure inside the adapter itself
    Bug,
    /// The submitting user's environment
    UserEnvironment,
    /// The worker's environment; the host may retry the split elsewhere
    RemoteEnvironment,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::Input => write!(f, "input"),
            ErrorSource::Bug => write!(f, "bug"),
            ErrorSource::UserEnvironment => write!(f, "user environment"),
            ErrorSource::RemoteEnvironment => write!(f, "remote environment"),
        }
    }
}

/// Coded execution failure handed back to the host engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (error {code}, {error_source})")]
pub struct ExecException {
    pub code: u32,
    pub error_source: ErrorSource,
    pub message: String,
}

impl ExecException {
    pub fn new(code: u32, error_source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            code,
            error_source,
            message: message.into(),
        }
    }

    /// The failure reported when the host interrupts a blocked read.
    pub fn interrupted() -> Self {
        Self::new(
            INPUT_READ_ERROR_CODE,
            ErrorSource::RemoteEnvironment,
            INPUT_READ_ERROR_MESSAGE,
        )
    }

    /// Whether the host may retry the split on another worker
    pub fn is_retriable(&self) -> bool {
        self.error_source == ErrorSource::RemoteEnvironment
    }
}

/// Main error type for the loader
///
/// Clonable so a failed projector can re-raise its last error on every
/// subsequent call.
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Failed to expand location '{location}': {source}")]
    Location {
        location: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Read failure: {0}")]
    Read(#[source] Arc<io::Error>),

    #[error(transparent)]
    Exec(#[from] ExecException),

    #[error("No record reader bound; prepare_to_read must be called first")]
    NotBound,
}

impl LoaderError {
    pub fn location(location: impl Into<String>, source: io::Error) -> Self {
        LoaderError::Location {
            location: location.into(),
            source: Arc::new(source),
        }
    }

    /// Numeric code when this is a coded host failure
    pub fn code(&self) -> Option<u32> {
        match self {
            LoaderError::Exec(e) => Some(e.code),
            _ => None,
        }
    }
}

impl From<io::Error> for LoaderError {
    fn from(err: io::Error) -> Self {
        LoaderError::Read(Arc::new(err))
    }
}
