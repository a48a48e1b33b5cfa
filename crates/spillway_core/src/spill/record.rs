//! Record framing for spill segments.

use crate::error::{SpillError, SpillErrorKind, SpillResult};
use crate::notification::{Notification, NotificationKind};
use spillway_codec::Serializer;
use spillway_storage::StorageBackend;

/// Bytes before the payload: kind (1) + length (4).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Bytes after the payload: crc32 (4).
pub const FRAME_TRAILER_SIZE: usize = 4;

/// Total framing overhead per record.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAME_TRAILER_SIZE;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Notification kind.
    pub kind: NotificationKind,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Parses a header from the first [`FRAME_HEADER_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization fault if the slice is short or the kind byte
    /// is unknown.
    pub fn decode(bytes: &[u8]) -> SpillResult<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(SpillError::serialization(format!(
                "frame header needs {FRAME_HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let kind = NotificationKind::from_byte(bytes[0]).ok_or_else(|| {
            SpillError::serialization(format!("unknown record kind 0x{:02x}", bytes[0]))
        })?;
        let payload_len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok(Self { kind, payload_len })
    }

    /// Length of the whole frame, header and trailer included.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        u64::from(self.payload_len) + FRAME_OVERHEAD as u64
    }
}

/// Encodes one notification as a complete frame.
///
/// Frame format:
/// ```text
/// | kind (1) | length (4, LE) | payload (length) | crc32 (4, LE) |
/// ```
///
/// # Errors
///
/// Returns a serialization fault if the value cannot be encoded or the
/// payload exceeds `u32::MAX` bytes.
pub fn encode_frame<T>(
    notification: &Notification<T>,
    serializer: &dyn Serializer<T>,
) -> SpillResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(64);
    buf.push(notification.kind().as_byte());
    buf.extend_from_slice(&[0u8; 4]);

    match notification {
        Notification::Value(value) => serializer.serialize(&mut buf, value)?,
        Notification::Error(error) => {
            buf.push(error.kind().as_byte());
            buf.extend_from_slice(error.message().as_bytes());
        }
        Notification::Complete => {}
    }

    let payload_len = u32::try_from(buf.len() - FRAME_HEADER_SIZE).map_err(|_| {
        SpillError::serialization(format!(
            "record payload of {} bytes exceeds frame limit",
            buf.len() - FRAME_HEADER_SIZE
        ))
    })?;
    buf[1..FRAME_HEADER_SIZE].copy_from_slice(&payload_len.to_le_bytes());

    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decodes one complete frame.
///
/// # Errors
///
/// Returns a serialization fault on a length mismatch, a checksum mismatch
/// or a payload the serializer rejects.
pub fn decode_frame<T>(frame: &[u8], serializer: &dyn Serializer<T>) -> SpillResult<Notification<T>> {
    let header = FrameHeader::decode(frame)?;
    if frame.len() as u64 != header.frame_len() {
        return Err(SpillError::serialization(format!(
            "frame length mismatch: header says {}, got {}",
            header.frame_len(),
            frame.len()
        )));
    }

    let body_end = frame.len() - FRAME_TRAILER_SIZE;
    let stored = u32::from_le_bytes([
        frame[body_end],
        frame[body_end + 1],
        frame[body_end + 2],
        frame[body_end + 3],
    ]);
    let computed = compute_crc32(&frame[..body_end]);
    if stored != computed {
        return Err(SpillError::serialization(format!(
            "checksum mismatch: expected {stored:08x}, computed {computed:08x}"
        )));
    }

    let payload = &frame[FRAME_HEADER_SIZE..body_end];
    match header.kind {
        NotificationKind::Value => {
            let mut source = payload;
            let value = serializer.deserialize(&mut source, payload.len())?;
            Ok(Notification::Value(value))
        }
        NotificationKind::Error => decode_error(payload).map(Notification::Error),
        NotificationKind::Complete => {
            if !payload.is_empty() {
                return Err(SpillError::serialization(
                    "completion record carries a payload",
                ));
            }
            Ok(Notification::Complete)
        }
    }
}

fn decode_error(payload: &[u8]) -> SpillResult<SpillError> {
    let (&kind_byte, message) = payload
        .split_first()
        .ok_or_else(|| SpillError::serialization("error record is empty"))?;
    let kind = SpillErrorKind::from_byte(kind_byte).ok_or_else(|| {
        SpillError::serialization(format!("unknown error kind 0x{kind_byte:02x}"))
    })?;
    let message = std::str::from_utf8(message)
        .map_err(|e| SpillError::serialization(format!("error message is not UTF-8: {e}")))?;
    Ok(SpillError::from_parts(kind, message))
}

/// Summary of one frame found by [`scan_frames`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Offset of the frame in the segment.
    pub offset: u64,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Payload length in bytes.
    pub payload_len: u32,
    /// Whether the stored checksum matches.
    pub crc_ok: bool,
}

/// Result of walking a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameScan {
    /// Frames found, in file order.
    pub frames: Vec<FrameInfo>,
    /// Bytes after the last whole frame (a torn or unreadable tail).
    pub trailing_bytes: u64,
    /// Set when the walk stopped on an unparseable header.
    pub stopped_on: Option<String>,
}

/// Walks the frames of a segment without decoding payloads.
///
/// Stops after `limit` frames when given.
///
/// # Errors
///
/// Returns an error only if the backend cannot be read.
pub fn scan_frames(backend: &dyn StorageBackend, limit: Option<usize>) -> SpillResult<FrameScan> {
    let size = backend.size()?;
    let mut scan = FrameScan::default();
    let mut offset = 0u64;

    while offset < size {
        if limit.is_some_and(|limit| scan.frames.len() >= limit) {
            return Ok(scan);
        }
        if size - offset < FRAME_HEADER_SIZE as u64 {
            break;
        }
        let header_bytes = backend.read_at(offset, FRAME_HEADER_SIZE)?;
        let header = match FrameHeader::decode(&header_bytes) {
            Ok(header) => header,
            Err(e) => {
                scan.stopped_on = Some(e.to_string());
                break;
            }
        };
        if size - offset < header.frame_len() {
            break;
        }

        let frame_len = usize::try_from(header.frame_len())
            .map_err(|_| SpillError::serialization("frame does not fit in memory"))?;
        let frame = backend.read_at(offset, frame_len)?;
        let body_end = frame_len - FRAME_TRAILER_SIZE;
        let stored = u32::from_le_bytes([
            frame[body_end],
            frame[body_end + 1],
            frame[body_end + 2],
            frame[body_end + 3],
        ]);

        scan.frames.push(FrameInfo {
            offset,
            kind: header.kind,
            payload_len: header.payload_len,
            crc_ok: stored == compute_crc32(&frame[..body_end]),
        });
        offset += header.frame_len();
    }

    scan.trailing_bytes = size - offset;
    Ok(scan)
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_codec::serializers;
    use spillway_storage::InMemoryBackend;

    #[test]
    fn value_frame_layout() {
        let frame = encode_frame(&Notification::Value(7), &serializers::integer()).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD + 4);
        assert_eq!(frame[0], NotificationKind::Value.as_byte());
        assert_eq!(&frame[1..5], &4u32.to_le_bytes());
        assert_eq!(&frame[5..9], &[0, 0, 0, 7]);
    }

    #[test]
    fn value_roundtrip() {
        let s = serializers::string();
        let frame = encode_frame(&Notification::Value("spill".to_string()), &s).unwrap();
        assert_eq!(
            decode_frame(&frame, &s).unwrap(),
            Notification::Value("spill".to_string())
        );
    }

    #[test]
    fn empty_value_is_a_valid_record() {
        let s = serializers::string();
        let frame = encode_frame(&Notification::Value(String::new()), &s).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD);
        assert_eq!(
            decode_frame(&frame, &s).unwrap(),
            Notification::Value(String::new())
        );
    }

    #[test]
    fn error_roundtrip() {
        let s = serializers::integer();
        let frame =
            encode_frame::<i32>(&Notification::Error(SpillError::io("disk gone")), &s).unwrap();
        assert_eq!(frame[0], NotificationKind::Error.as_byte());
        assert_eq!(
            decode_frame(&frame, &s).unwrap(),
            Notification::Error(SpillError::io("disk gone"))
        );
    }

    #[test]
    fn complete_roundtrip() {
        let s = serializers::integer();
        let frame = encode_frame::<i32>(&Notification::Complete, &s).unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD);
        assert_eq!(decode_frame(&frame, &s).unwrap(), Notification::Complete);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let s = serializers::integer();
        let mut frame = encode_frame(&Notification::Value(1), &s).unwrap();
        frame[6] ^= 0xFF;
        let err = decode_frame(&frame, &s).unwrap_err();
        assert!(matches!(err, SpillError::Serialization { .. }));
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut frame = encode_frame(&Notification::Value(1), &serializers::integer()).unwrap();
        frame[0] = 0x42;
        assert!(FrameHeader::decode(&frame).is_err());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let s = serializers::integer();
        let frame = encode_frame(&Notification::Value(1), &s).unwrap();
        assert!(decode_frame(&frame[..frame.len() - 1], &s).is_err());
    }

    #[test]
    fn short_value_payload_is_serialization_fault() {
        // Length prefix says 2 bytes; the i32 serializer needs 4.
        let mut frame = vec![NotificationKind::Value.as_byte()];
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.extend_from_slice(&[0, 1]);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let err = decode_frame(&frame, &serializers::integer()).unwrap_err();
        assert!(matches!(err, SpillError::Serialization { .. }));
    }

    #[test]
    fn scan_reports_frames_and_torn_tail() {
        let s = serializers::integer();
        let backend = InMemoryBackend::new();
        for i in 0..3 {
            backend
                .append(&encode_frame(&Notification::Value(i), &s).unwrap())
                .unwrap();
        }
        backend
            .append(&encode_frame::<i32>(&Notification::Complete, &s).unwrap())
            .unwrap();
        backend.append(&[1, 0]).unwrap();

        let scan = scan_frames(&backend, None).unwrap();
        assert_eq!(scan.frames.len(), 4);
        assert!(scan.frames.iter().all(|f| f.crc_ok));
        assert_eq!(scan.frames[1].offset, 13);
        assert_eq!(scan.frames[3].kind, NotificationKind::Complete);
        assert_eq!(scan.trailing_bytes, 2);
        assert!(scan.stopped_on.is_none());

        let limited = scan_frames(&backend, Some(2)).unwrap();
        assert_eq!(limited.frames.len(), 2);
    }

    #[test]
    fn scan_stops_on_garbage() {
        let backend = InMemoryBackend::with_data(vec![0xAB; 32]);
        let scan = scan_frames(&backend, None).unwrap();
        assert!(scan.frames.is_empty());
        assert!(scan.stopped_on.is_some());
        assert_eq!(scan.trailing_bytes, 32);
    }

    #[test]
    fn crc32_known_value() {
        // Known test vector: "123456789" should give 0xCBF43926
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0);
    }
}
