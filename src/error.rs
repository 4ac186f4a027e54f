//! Custom error types and result handling for batch conversions.
//!
//! Every fallible operation in the crate returns a [`Result<T>`], a type alias for
//! `std::result::Result<T, Error>`. The four conversion-step variants
//! ([`Error::Staging`], [`Error::Transform`], [`Error::ExternalTool`] and
//! [`Error::Publish`]) never escape a job: the converter records them on the job's
//! [`ConversionOutcome`](crate::types::ConversionOutcome) instead.
//!
use std::path::PathBuf;

/// Type alias for Results with batch conversion errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all batch conversion operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Copying or extracting the source payload into the workspace failed
    #[error("Staging failed: {0}")]
    Staging(String),
    /// Producing the intermediate documents of a FB2 source failed
    #[error("Transform failed: {0}")]
    Transform(String),
    /// The external e-book compiler could not be launched or awaited
    #[error("External tool failed: {0}")]
    ExternalTool(String),
    /// Copying the compiled book to its destination failed
    #[error("Publish failed: {0}")]
    Publish(String),
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP archive errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    /// Base64 payload decoding errors
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Invalid engine configuration rejected by the builder
    #[error(transparent)]
    ConfigBuilder(#[from] crate::config::EngineConfigBuilderError),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for resources that couldn't be found (e.g., the source directory)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Files a failure under a conversion step unless it already names one.
    ///
    /// `step` is one of the step constructors, e.g. `Error::Staging`.
    pub(crate) fn within_step(self, step: fn(String) -> Error) -> Error {
        match self {
            Error::Staging(_) | Error::Transform(_) | Error::ExternalTool(_) | Error::Publish(_) => {
                self
            }
            other => step(other.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
