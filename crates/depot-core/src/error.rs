// Copyright 2026 The Depot Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for Depot storage operations.

use thiserror::Error;

/// A specialized `Result` type for Depot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Depot storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver does not implement the requested contract operation.
    #[error("unsupported operation for {driver_kind} storage: {operation}")]
    Unsupported {
        /// Name of the contract operation that was requested.
        operation: &'static str,
        /// Kind of the driver that rejected it.
        driver_kind: &'static str,
    },

    /// A state transition was rejected because the target already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A state transition was rejected because the target does not exist.
    #[error("{0} does not exist")]
    DoesNotExist(String),

    /// No store is configured under the given driver identifier.
    #[error("unknown storage driver: {0}")]
    UnknownDriver(String),

    /// The storage location or auxiliary tag is not valid for the driver.
    #[error("invalid storage location: {0}")]
    InvalidLocation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error from the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object-store transport or service failure.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Remote HTTP store transport failure.
    #[error("remote store error: {0}")]
    Remote(String),
}

impl Error {
    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported(operation: &'static str, driver_kind: &'static str) -> Self {
        Self::Unsupported { operation, driver_kind }
    }

    /// Returns true for rejections of a requested state transition
    /// (preservation version already present / missing).
    ///
    /// Callers must inspect current state before retrying with a different
    /// operation; these are never transient.
    #[must_use]
    pub const fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::DoesNotExist(_))
    }

    /// Returns true if the driver rejected the operation as unsupported.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_display() {
        let err = Error::unsupported("file_system_path", "s3");
        assert_eq!(
            err.to_string(),
            "unsupported operation for s3 storage: file_system_path"
        );
        assert!(err.is_unsupported());
        assert!(!err.is_precondition_violation());
    }

    #[test]
    fn test_precondition_classification() {
        assert!(Error::AlreadyExists("preservation version".into()).is_precondition_violation());
        assert!(Error::DoesNotExist("preservation version".into()).is_precondition_violation());
        assert!(!Error::Config("bad".into()).is_precondition_violation());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io(_)));
    }
}
