//! The public error type. Internally the crate uses `anyhow` for propagation and context; at the
//! boundary of a command each error is tagged with an `ErrorType` so that callers (the CLI and the
//! HTTP server) can tell a missing record apart from a storage failure.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Internal result type used below the command boundary.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The result type returned by public functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an error, used to decide how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// The configuration or the data directory is missing or invalid.
    Config,
    /// Reading or writing the dataset file or its backups failed.
    Storage,
    /// A record addressed by ID does not exist.
    NotFound,
    /// The caller sent something we cannot accept.
    Request,
    /// Talking to the cloud mirror failed.
    Sync,
    /// A long-running service (the HTTP server, the OAuth listener) failed.
    Service,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// An error with an `ErrorType` attached.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    /// Creates a `NotFound` error with `message`.
    pub fn not_found(message: impl Display) -> Self {
        Self::new(ErrorType::NotFound, anyhow::anyhow!("{message}"))
    }

    /// Creates a `Request` error with `message`.
    pub fn request(message: impl Display) -> Self {
        Self::new(ErrorType::Request, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn is_not_found(&self) -> bool {
        self.error_type == ErrorType::NotFound
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The alternate form includes the context chain, e.g. "Unable to save: permission denied"
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::new(ErrorType::Internal, value)
    }
}

/// Attaches an `ErrorType` to an internal result.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_context() {
        let res: Res<()> = Err(anyhow::anyhow!("disk full")).context("Unable to save");
        let err = res.pub_result(ErrorType::Storage).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
        assert_eq!(err.to_string(), "Unable to save: disk full");
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::NotFound.to_string(), "NOT_FOUND");
        assert!(Error::not_found("Record 5 not found").is_not_found());
        assert!(!Error::request("bad").is_not_found());
    }
}
