//! CBOR serializer for arbitrary `serde` types.

use crate::error::{CodecError, CodecResult};
use crate::Serializer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;

/// Encodes any `serde` value as CBOR using `ciborium`.
///
/// This is the general-purpose choice when a value has no hand-written
/// serializer. Composite values (lists, maps, structs) round-trip intact.
///
/// ```
/// use spillway_codec::{serializers, Serializer};
///
/// let s = serializers::cbor::<Vec<u32>>();
/// let bytes = s.encode(&vec![3, 4]).unwrap();
/// assert_eq!(s.decode(&bytes).unwrap(), vec![3, 4]);
/// ```
pub struct CborSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborSerializer<T> {
    /// Creates a CBOR serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for CborSerializer<T> {}

impl<T> fmt::Debug for CborSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CborSerializer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Serializer<T> for CborSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, sink: &mut dyn Write, value: &T) -> CodecResult<()> {
        ciborium::into_writer(value, sink).map_err(|e| match e {
            ciborium::ser::Error::Io(io) => CodecError::from(io),
            ciborium::ser::Error::Value(message) => CodecError::encoding(message),
        })
    }

    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<T> {
        let mut limited = source.take(available as u64);
        ciborium::from_reader(&mut limited).map_err(|e| match e {
            ciborium::de::Error::Io(io) => match CodecError::from(io) {
                CodecError::Incomplete { .. } => CodecError::Incomplete { available },
                other => other,
            },
            ciborium::de::Error::Syntax(offset) => {
                CodecError::decoding(format!("CBOR syntax error at byte {offset}"))
            }
            ciborium::de::Error::Semantic(_, message) => CodecError::decoding(message),
            ciborium::de::Error::RecursionLimitExceeded => {
                CodecError::decoding("CBOR recursion limit exceeded")
            }
        })
    }
}
