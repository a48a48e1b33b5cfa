//! Error types for Spillway core.

use spillway_codec::CodecError;
use spillway_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type SpillResult<T> = Result<T, SpillError>;

/// Errors surfaced by the buffering stage, the drain engine and the queues.
///
/// Errors are cloneable and carry plain messages so that an error emitted by
/// a producer can be framed into a spill segment and re-created when read
/// back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpillError {
    /// A queue rejected an offer against its capacity.
    #[error("backpressure violation: queue rejected an offered item")]
    BackpressureViolation,

    /// Reading or writing backing storage failed.
    #[error("I/O fault: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// A value or frame could not be encoded or decoded.
    #[error("serialization fault: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// The upstream producer failed.
    #[error("producer fault: {message}")]
    Producer {
        /// Description of the failure.
        message: String,
    },

    /// A call-site argument was invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid argument.
        message: String,
    },
}

/// Discriminant of a [`SpillError`], as stored in an error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpillErrorKind {
    /// [`SpillError::BackpressureViolation`].
    BackpressureViolation = 1,
    /// [`SpillError::Io`].
    Io = 2,
    /// [`SpillError::Serialization`].
    Serialization = 3,
    /// [`SpillError::Producer`].
    Producer = 4,
    /// [`SpillError::Configuration`].
    Configuration = 5,
}

impl SpillErrorKind {
    /// Converts a byte to an error kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::BackpressureViolation),
            2 => Some(Self::Io),
            3 => Some(Self::Serialization),
            4 => Some(Self::Producer),
            5 => Some(Self::Configuration),
            _ => None,
        }
    }

    /// Converts the kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl SpillError {
    /// Creates an I/O fault.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a serialization fault.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a producer fault.
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the discriminant of this error.
    #[must_use]
    pub fn kind(&self) -> SpillErrorKind {
        match self {
            Self::BackpressureViolation => SpillErrorKind::BackpressureViolation,
            Self::Io { .. } => SpillErrorKind::Io,
            Self::Serialization { .. } => SpillErrorKind::Serialization,
            Self::Producer { .. } => SpillErrorKind::Producer,
            Self::Configuration { .. } => SpillErrorKind::Configuration,
        }
    }

    /// Returns the message carried by this error (empty for
    /// [`SpillError::BackpressureViolation`]).
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BackpressureViolation => "",
            Self::Io { message }
            | Self::Serialization { message }
            | Self::Producer { message }
            | Self::Configuration { message } => message,
        }
    }

    /// Rebuilds an error from its kind and message.
    pub fn from_parts(kind: SpillErrorKind, message: impl Into<String>) -> Self {
        match kind {
            SpillErrorKind::BackpressureViolation => Self::BackpressureViolation,
            SpillErrorKind::Io => Self::io(message),
            SpillErrorKind::Serialization => Self::serialization(message),
            SpillErrorKind::Producer => Self::producer(message),
            SpillErrorKind::Configuration => Self::configuration(message),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::BackpressureViolation => "backpressure_violation",
            Self::Io { .. } => "io_fault",
            Self::Serialization { .. } => "serialization_fault",
            Self::Producer { .. } => "producer_fault",
            Self::Configuration { .. } => "configuration_error",
        }
    }
}

impl From<StorageError> for SpillError {
    fn from(e: StorageError) -> Self {
        Self::io(e.to_string())
    }
}

impl From<CodecError> for SpillError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io { message } => Self::io(message),
            other => Self::serialization(other.to_string()),
        }
    }
}

impl From<io::Error> for SpillError {
    fn from(e: io::Error) -> Self {
        Self::io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_byte_roundtrip() {
        for kind in [
            SpillErrorKind::BackpressureViolation,
            SpillErrorKind::Io,
            SpillErrorKind::Serialization,
            SpillErrorKind::Producer,
            SpillErrorKind::Configuration,
        ] {
            assert_eq!(SpillErrorKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(SpillErrorKind::from_byte(0), None);
        assert_eq!(SpillErrorKind::from_byte(6), None);
    }

    #[test]
    fn parts_rebuild_the_error() {
        let errors = [
            SpillError::BackpressureViolation,
            SpillError::io("disk full"),
            SpillError::serialization("bad frame"),
            SpillError::producer("boo"),
            SpillError::configuration("negative request"),
        ];
        for e in errors {
            assert_eq!(SpillError::from_parts(e.kind(), e.message()), e);
        }
    }

    #[test]
    fn storage_errors_are_io_faults() {
        let e: SpillError = StorageError::Closed.into();
        assert_eq!(e.kind(), SpillErrorKind::Io);
    }

    #[test]
    fn codec_errors_map_by_kind() {
        let io: SpillError = CodecError::io("pipe").into();
        assert_eq!(io, SpillError::io("pipe"));

        let decode: SpillError = CodecError::decoding("garbage").into();
        assert_eq!(decode.kind(), SpillErrorKind::Serialization);

        let short: SpillError = CodecError::Incomplete { available: 2 }.into();
        assert_eq!(short.kind(), SpillErrorKind::Serialization);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(SpillError::io("x").as_label(), "io_fault");
        assert_eq!(
            SpillError::BackpressureViolation.as_label(),
            "backpressure_violation"
        );
    }
}
