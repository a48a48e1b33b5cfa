//! Built-in serializers for common value types.

use crate::error::{CodecError, CodecResult};
use crate::Serializer;
use std::io::{Read, Write};

/// Reads exactly `available` bytes, reporting a short source as incomplete.
fn read_record(source: &mut dyn Read, available: usize) -> CodecResult<Vec<u8>> {
    let mut buf = vec![0u8; available];
    source
        .read_exact(&mut buf)
        .map_err(|e| match CodecError::from(e) {
            CodecError::Incomplete { .. } => CodecError::Incomplete { available },
            other => other,
        })?;
    Ok(buf)
}

/// UTF-8 strings. The whole record is the string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn serialize(&self, sink: &mut dyn Write, value: &String) -> CodecResult<()> {
        sink.write_all(value.as_bytes())?;
        Ok(())
    }

    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<String> {
        let bytes = read_record(source, available)?;
        String::from_utf8(bytes).map_err(|e| CodecError::decoding(e.to_string()))
    }
}

/// Big-endian 32-bit signed integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct I32Serializer;

impl Serializer<i32> for I32Serializer {
    fn serialize(&self, sink: &mut dyn Write, value: &i32) -> CodecResult<()> {
        sink.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<i32> {
        if available < 4 {
            return Err(CodecError::Incomplete { available });
        }
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }
}

/// Big-endian 64-bit signed integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Serializer;

impl Serializer<i64> for I64Serializer {
    fn serialize(&self, sink: &mut dyn Write, value: &i64) -> CodecResult<()> {
        sink.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<i64> {
        if available < 8 {
            return Err(CodecError::Incomplete { available });
        }
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }
}

/// Raw byte vectors. The whole record is the vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl Serializer<Vec<u8>> for BytesSerializer {
    fn serialize(&self, sink: &mut dyn Write, value: &Vec<u8>) -> CodecResult<()> {
        sink.write_all(value)?;
        Ok(())
    }

    fn deserialize(&self, source: &mut dyn Read, available: usize) -> CodecResult<Vec<u8>> {
        read_record(source, available)
    }
}
