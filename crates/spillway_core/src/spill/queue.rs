//! The persistent spillover queue.

use super::record;
use super::segment::{LogSegment, ReadOutcome};
use crate::config::{Options, RolloverPolicy};
use crate::error::SpillResult;
use crate::notification::Notification;
use crate::queue::Queue;
use parking_lot::Mutex;
use spillway_codec::Serializer;
use spillway_storage::SegmentFactory;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Producer-side state.
struct WriterState {
    tail: Option<Arc<LogSegment>>,
    next_sequence: u64,
}

/// Consumer-side state.
struct ReaderState {
    head: Option<Arc<LogSegment>>,
}

/// A FIFO of notifications spilled to segment files.
///
/// Logical capacity is unbounded; live disk usage is bounded by the rollover
/// policy because fully read segments are deleted as the reader leaves them.
///
/// # Locking
///
/// - `writer`: producers and teardown
/// - `reader`: the drain loop and teardown
/// - `segments`: innermost; rollover, segment exhaustion and teardown
///
/// Teardown takes `writer` then `reader`. Neither side takes the other's
/// lock.
///
/// The first segment is created by the first offer, so a stream that never
/// emits a value never touches the disk.
pub struct SpillQueue<T> {
    serializer: Arc<dyn Serializer<T>>,
    factory: Arc<dyn SegmentFactory>,
    rollover: RolloverPolicy,
    sync_on_rollover: bool,
    writer: Mutex<WriterState>,
    reader: Mutex<ReaderState>,
    segments: Mutex<VecDeque<Arc<LogSegment>>>,
    offered: AtomicU64,
    polled: AtomicU64,
    segments_created: AtomicU64,
    closed: AtomicBool,
}

impl<T> SpillQueue<T> {
    /// Creates a queue that writes through `serializer` into segments from
    /// `options.file_factory`.
    pub fn new(serializer: Arc<dyn Serializer<T>>, options: &Options) -> Self {
        Self {
            serializer,
            factory: Arc::clone(&options.file_factory),
            rollover: options.rollover_policy(),
            sync_on_rollover: options.sync_on_rollover,
            writer: Mutex::new(WriterState {
                tail: None,
                next_sequence: 1,
            }),
            reader: Mutex::new(ReaderState { head: None }),
            segments: Mutex::new(VecDeque::new()),
            offered: AtomicU64::new(0),
            polled: AtomicU64::new(0),
            segments_created: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live (not yet deleted) segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }

    /// Number of segments created over the queue's lifetime.
    #[must_use]
    pub fn segments_created(&self) -> u64 {
        self.segments_created.load(Ordering::Acquire)
    }

    /// Locations of live segments, oldest first.
    #[must_use]
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.segments
            .lock()
            .iter()
            .filter_map(|s| s.location().map(PathBuf::from))
            .collect()
    }

    fn open_segment(&self, writer: &mut WriterState) -> SpillResult<Arc<LogSegment>> {
        let sequence = writer.next_sequence;
        let backend = self.factory.create(sequence)?;
        let segment = Arc::new(LogSegment::new(sequence, backend));
        writer.next_sequence += 1;

        self.segments.lock().push_back(Arc::clone(&segment));
        writer.tail = Some(Arc::clone(&segment));
        self.segments_created.fetch_add(1, Ordering::AcqRel);

        debug!(
            sequence,
            path = ?segment.location(),
            "created spill segment"
        );
        Ok(segment)
    }

    /// Opens the successor before sealing `old`, so a reader that sees the
    /// seal always finds the next segment in the list.
    fn roll(&self, writer: &mut WriterState, old: &LogSegment) -> SpillResult<()> {
        self.open_segment(writer)?;
        old.seal(self.sync_on_rollover)
    }

    /// Drops an exhausted head segment.
    fn retire(&self, head: &Arc<LogSegment>) -> SpillResult<()> {
        {
            let mut segments = self.segments.lock();
            if segments.front().is_some_and(|front| Arc::ptr_eq(front, head)) {
                segments.pop_front();
            }
        }
        head.destroy()
    }

    fn teardown(&self) {
        let mut writer = self.writer.lock();
        let mut reader = self.reader.lock();
        writer.tail = None;
        reader.head = None;

        let segments: Vec<_> = self.segments.lock().drain(..).collect();
        let count = segments.len();
        for segment in segments {
            if let Err(e) = segment.destroy() {
                warn!(
                    sequence = segment.sequence(),
                    path = ?segment.location(),
                    error = %e,
                    "failed to delete spill segment"
                );
            }
        }
        debug!(deleted = count, "spill queue closed");
    }
}

impl<T> Queue<T> for SpillQueue<T> {
    fn offer(&self, notification: Notification<T>) -> SpillResult<bool> {
        if self.closed.load(Ordering::Acquire) {
            trace!("offer after close discarded");
            return Ok(true);
        }
        let frame = record::encode_frame(&notification, &*self.serializer)?;

        let mut writer = self.writer.lock();
        if self.closed.load(Ordering::Acquire) {
            trace!("offer after close discarded");
            return Ok(true);
        }
        let tail = match &writer.tail {
            Some(tail) => Arc::clone(tail),
            None => self.open_segment(&mut writer)?,
        };

        tail.append(&frame)?;
        self.offered.fetch_add(1, Ordering::AcqRel);

        if self
            .rollover
            .should_roll(tail.published_bytes(), tail.record_count())
        {
            self.roll(&mut writer, &tail)?;
        }
        Ok(true)
    }

    fn poll(&self) -> SpillResult<Option<Notification<T>>> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut reader = self.reader.lock();
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }

        loop {
            let head = match &reader.head {
                Some(head) => Arc::clone(head),
                None => match self.segments.lock().front() {
                    Some(front) => Arc::clone(front),
                    None => return Ok(None),
                },
            };
            reader.head = Some(Arc::clone(&head));

            match head.read_next(&*self.serializer)? {
                ReadOutcome::Record(notification) => {
                    self.polled.fetch_add(1, Ordering::AcqRel);
                    return Ok(Some(notification));
                }
                ReadOutcome::Pending => return Ok(None),
                ReadOutcome::Exhausted => {
                    reader.head = None;
                    self.retire(&head)?;
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn len(&self) -> usize {
        let polled = self.polled.load(Ordering::Acquire);
        let offered = self.offered.load(Ordering::Acquire);
        usize::try_from(offered.saturating_sub(polled)).unwrap_or(usize::MAX)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.teardown();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for SpillQueue<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for SpillQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpillQueue")
            .field("rollover", &self.rollover)
            .field("len", &self.len())
            .field("segments", &self.segment_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
