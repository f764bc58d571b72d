//! Crate-wide error type.
//!
//! Every read-path failure is either a [`Error::Corruption`] (the bytes on
//! disk do not describe a valid table) or an [`Error::Io`] (the storage
//! layer failed to deliver them). "Key not present" is never an error.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::encoding::EncodingError;

/// Errors returned by table operations.
///
/// The type is `Clone` so that cursors can hand out their status any
/// number of times; I/O errors are shared behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed footer, index, block, handle, or a checksum mismatch.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Underlying read failure.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// Invalid configuration parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Shorthand for building a [`Error::Corruption`].
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Returns `true` for [`Error::Corruption`].
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }

    /// Returns `true` for [`Error::Io`].
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Self::Corruption(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
