//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during serialization or deserialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The sink or source failed.
    #[error("I/O failure: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },

    /// The source ended before a whole value was read.
    ///
    /// Distinct from [`CodecError::Decoding`]: the bytes seen so far may be
    /// valid, there are just not enough of them.
    #[error("incomplete record: expected more than {available} bytes")]
    Incomplete {
        /// Bytes that were available to the reader.
        available: usize,
    },

    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The bytes do not form a valid value.
    #[error("decoding failed: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Returns `true` if the error only means "not enough bytes yet".
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::Incomplete { available: 0 },
            io::ErrorKind::InvalidData => Self::decoding(e.to_string()),
            _ => Self::io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_is_incomplete() {
        let e: CodecError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(e.is_incomplete());
    }

    #[test]
    fn invalid_data_is_decoding() {
        let e: CodecError = io::Error::new(io::ErrorKind::InvalidData, "bad").into();
        assert!(matches!(e, CodecError::Decoding { .. }));
    }

    #[test]
    fn other_io_is_io() {
        let e: CodecError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(e, CodecError::Io { .. }));
        assert!(!e.is_incomplete());
    }
}
