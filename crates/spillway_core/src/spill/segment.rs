//! One backing store of the spillover queue.

use super::record::{self, FrameHeader, FRAME_HEADER_SIZE};
use crate::error::{SpillError, SpillResult};
use crate::notification::Notification;
use spillway_codec::Serializer;
use spillway_storage::StorageBackend;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// What the reader found at its cursor.
#[derive(Debug)]
pub(crate) enum ReadOutcome<T> {
    /// A whole record.
    Record(Notification<T>),
    /// Nothing published past the cursor yet.
    Pending,
    /// The segment is sealed and fully read.
    Exhausted,
}

/// A log segment: a backing store plus its cursors.
///
/// The producer appends whole frames and advances the published watermark
/// after each flush. The drain loop reads below the watermark only. Once the
/// producer moves on to a newer segment it seals this one; a sealed segment
/// whose read cursor reached the watermark is finished.
///
/// Ordering: the writer stores the watermark before `sealed` (both release);
/// the reader loads `sealed` before the watermark (both acquire), so a reader
/// that sees `sealed` also sees the final watermark.
#[derive(Debug)]
pub(crate) struct LogSegment {
    sequence: u64,
    backend: Box<dyn StorageBackend>,
    watermark: AtomicU64,
    records: AtomicU64,
    read_cursor: AtomicU64,
    sealed: AtomicBool,
}

impl LogSegment {
    pub(crate) fn new(sequence: u64, backend: Box<dyn StorageBackend>) -> Self {
        Self {
            sequence,
            backend,
            watermark: AtomicU64::new(0),
            records: AtomicU64::new(0),
            read_cursor: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn location(&self) -> Option<&Path> {
        self.backend.location()
    }

    /// Bytes visible to the reader.
    pub(crate) fn published_bytes(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Records appended so far.
    pub(crate) fn record_count(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Appends one frame and publishes it. Writer side only.
    pub(crate) fn append(&self, frame: &[u8]) -> SpillResult<()> {
        let offset = self.backend.append(frame)?;
        self.backend.flush()?;
        self.records.fetch_add(1, Ordering::AcqRel);
        self.watermark
            .store(offset + frame.len() as u64, Ordering::Release);
        Ok(())
    }

    /// Marks the segment as finished for writing. Writer side only.
    pub(crate) fn seal(&self, sync: bool) -> SpillResult<()> {
        if sync {
            self.backend.sync()?;
        }
        self.sealed.store(true, Ordering::Release);
        debug!(
            sequence = self.sequence,
            bytes = self.published_bytes(),
            records = self.record_count(),
            "sealed spill segment"
        );
        Ok(())
    }

    /// Reads the record at the cursor. Reader side only.
    pub(crate) fn read_next<T>(&self, serializer: &dyn Serializer<T>) -> SpillResult<ReadOutcome<T>> {
        let sealed = self.sealed.load(Ordering::Acquire);
        let watermark = self.watermark.load(Ordering::Acquire);
        let cursor = self.read_cursor.load(Ordering::Acquire);

        if cursor >= watermark {
            debug_assert_eq!(cursor, watermark, "read cursor passed the watermark");
            return Ok(if sealed {
                ReadOutcome::Exhausted
            } else {
                ReadOutcome::Pending
            });
        }

        // The watermark only ever sits on a frame boundary, so anything short
        // of a whole frame below it is damage.
        if watermark - cursor < FRAME_HEADER_SIZE as u64 {
            return Err(self.torn(cursor, watermark));
        }
        let header_bytes = self.backend.read_at(cursor, FRAME_HEADER_SIZE)?;
        let header = FrameHeader::decode(&header_bytes)?;
        let end = cursor + header.frame_len();
        if end > watermark {
            return Err(self.torn(cursor, watermark));
        }

        let frame_len = usize::try_from(header.frame_len())
            .map_err(|_| SpillError::serialization("frame does not fit in memory"))?;
        let frame = self.backend.read_at(cursor, frame_len)?;
        let notification = record::decode_frame(&frame, serializer)?;

        self.read_cursor.store(end, Ordering::Release);
        Ok(ReadOutcome::Record(notification))
    }

    fn torn(&self, cursor: u64, watermark: u64) -> SpillError {
        SpillError::serialization(format!(
            "segment {} has a torn record at offset {cursor} (published {watermark})",
            self.sequence
        ))
    }

    /// Deletes the backing store. Idempotent.
    pub(crate) fn destroy(&self) -> SpillResult<()> {
        if self.backend.is_destroyed() {
            return Ok(());
        }
        self.backend.destroy()?;
        debug!(
            sequence = self.sequence,
            path = ?self.location(),
            "deleted spill segment"
        );
        Ok(())
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.backend.is_destroyed()
    }
}
