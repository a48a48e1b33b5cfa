//! # Spillway Codec
//!
//! Serializer contract used to write buffered values into spill segments.
//!
//! A [`Serializer`] turns one value into bytes and back. The spillover queue
//! frames each serialized value with its own length prefix, so serializers
//! never need to delimit their output: on read they receive a source holding
//! exactly the bytes they wrote, plus that byte count as a hint.
//!
//! ## Built-in serializers
//!
//! | constructor | type | encoding |
//! |-------------|------|----------|
//! | [`serializers::string()`] | `String` | raw UTF-8 |
//! | [`serializers::integer()`] | `i32` | 4 bytes big-endian |
//! | [`serializers::long()`] | `i64` | 8 bytes big-endian |
//! | [`serializers::bytes()`] | `Vec<u8>` | raw |
//! | [`serializers::cbor()`] | any `serde` type | CBOR |
//!
//! ## Usage
//!
//! ```
//! use spillway_codec::{serializers, Serializer};
//!
//! let s = serializers::integer();
//! let bytes = s.encode(&42).unwrap();
//! assert_eq!(bytes, vec![0, 0, 0, 42]);
//! assert_eq!(s.decode(&bytes).unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builtin;
mod cbor;
mod error;

pub use builtin::{BytesSerializer, I32Serializer, I64Serializer, StringSerializer};
pub use cbor::CborSerializer;
pub use error::{CodecError, CodecResult};

use std::io::{Read, Write};

/// Converts values of type `T` to and from bytes.
///
/// Implementations must be stateless with respect to individual records:
/// the same serializer instance is shared by the producer thread (writing)
/// and the drain thread (reading).
pub trait Serializer<T>: Send + Sync {
    /// Writes `value` to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Io`] if the sink fails or
    /// [`CodecError::Encoding`] if the value cannot be represented.
    fn serialize(&self, sink: &mut dyn Write, value: &T) -> CodecResult<()>;

    /// Reads one value from `source`.
    ///
    /// `available` is the number of bytes the record holds.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Incomplete`] if `source` ran out before a whole
    /// value was read, [`CodecError::Decoding`] if the bytes are not a valid
    /// value, or [`CodecError::Io`] if the source fails.
    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<T>;

    /// Serializes `value` into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Serializer::serialize`].
    fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf, value)?;
        Ok(buf)
    }

    /// Deserializes one value from `bytes`.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Serializer::deserialize`].
    fn decode(&self, bytes: &[u8]) -> CodecResult<T> {
        let mut source = bytes;
        self.deserialize(&mut source, bytes.len())
    }
}

/// Constructors for the built-in serializers.
pub mod serializers {
    use super::{BytesSerializer, CborSerializer, I32Serializer, I64Serializer, StringSerializer};

    /// UTF-8 strings, one string per record.
    #[must_use]
    pub const fn string() -> StringSerializer {
        StringSerializer
    }

    /// Big-endian `i32`.
    #[must_use]
    pub const fn integer() -> I32Serializer {
        I32Serializer
    }

    /// Big-endian `i64`.
    #[must_use]
    pub const fn long() -> I64Serializer {
        I64Serializer
    }

    /// Raw byte vectors, one vector per record.
    #[must_use]
    pub const fn bytes() -> BytesSerializer {
        BytesSerializer
    }

    /// Any `serde` type, encoded as CBOR.
    #[must_use]
    pub const fn cbor<T>() -> CborSerializer<T> {
        CborSerializer::new()
    }
}
