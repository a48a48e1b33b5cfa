//! Buffering stage configuration.

use crate::error::{SpillError, SpillResult};
use spillway_storage::{FileFactory, SegmentFactory};
use std::sync::Arc;

/// Default segment size threshold.
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 64 * 1024 * 1024; // 64 MB

/// When the spillover queue starts a new segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverPolicy {
    /// Everything goes into one segment.
    Disabled,
    /// Roll once a segment holds at least `max_bytes` bytes or
    /// `max_records` records, whichever comes first.
    Threshold {
        /// Byte threshold (`u64::MAX` for none).
        max_bytes: u64,
        /// Record threshold (`u64::MAX` for none).
        max_records: u64,
    },
}

impl RolloverPolicy {
    /// Returns `true` if a segment of this size should be sealed.
    #[must_use]
    pub fn should_roll(&self, bytes: u64, records: u64) -> bool {
        match *self {
            Self::Disabled => false,
            Self::Threshold {
                max_bytes,
                max_records,
            } => bytes >= max_bytes || records >= max_records,
        }
    }
}

/// Options for [`buffer_to_file`](crate::buffer_to_file).
///
/// ```
/// use spillway_core::Options;
///
/// let options = Options::new().rollover_every(10).delay_error(false);
/// assert_eq!(options.max_segment_records, 10);
/// assert!(!options.delay_error);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether segments roll over at all.
    pub rollover_enabled: bool,

    /// Byte threshold per segment (`u64::MAX` = no limit).
    pub max_segment_bytes: u64,

    /// Record threshold per segment (`u64::MAX` = no limit).
    pub max_segment_records: u64,

    /// Creates the backing store for each new segment.
    pub file_factory: Arc<dyn SegmentFactory>,

    /// Deliver a producer error only after buffered values drain.
    pub delay_error: bool,

    /// `fsync` a segment when it is sealed.
    pub sync_on_rollover: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rollover_enabled: true,
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            max_segment_records: u64::MAX,
            file_factory: Arc::new(FileFactory::temp()),
            delay_error: true,
            sync_on_rollover: false,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rolls over after `records` records per segment.
    ///
    /// Replaces the byte threshold.
    #[must_use]
    pub const fn rollover_every(mut self, records: u64) -> Self {
        self.rollover_enabled = true;
        self.max_segment_records = records;
        self.max_segment_bytes = u64::MAX;
        self
    }

    /// Rolls over after `bytes` bytes per segment.
    ///
    /// Replaces the record threshold.
    #[must_use]
    pub const fn rollover_size_bytes(mut self, bytes: u64) -> Self {
        self.rollover_enabled = true;
        self.max_segment_bytes = bytes;
        self.max_segment_records = u64::MAX;
        self
    }

    /// Keeps everything in a single segment.
    #[must_use]
    pub const fn disable_rollover(mut self) -> Self {
        self.rollover_enabled = false;
        self
    }

    /// Sets the segment factory.
    #[must_use]
    pub fn file_factory(mut self, factory: impl SegmentFactory + 'static) -> Self {
        self.file_factory = Arc::new(factory);
        self
    }

    /// Sets whether producer errors wait for buffered values to drain.
    #[must_use]
    pub const fn delay_error(mut self, value: bool) -> Self {
        self.delay_error = value;
        self
    }

    /// Sets whether sealed segments are synced to disk.
    #[must_use]
    pub const fn sync_on_rollover(mut self, value: bool) -> Self {
        self.sync_on_rollover = value;
        self
    }

    /// Returns the effective rollover policy.
    #[must_use]
    pub fn rollover_policy(&self) -> RolloverPolicy {
        if self.rollover_enabled {
            RolloverPolicy::Threshold {
                max_bytes: self.max_segment_bytes,
                max_records: self.max_segment_records,
            }
        } else {
            RolloverPolicy::Disabled
        }
    }

    /// Checks the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Configuration`] if rollover is enabled with a
    /// zero threshold.
    pub fn validate(&self) -> SpillResult<()> {
        if !self.rollover_enabled {
            return Ok(());
        }
        if self.max_segment_bytes == 0 {
            return Err(SpillError::configuration(
                "rollover size must be greater than zero bytes",
            ));
        }
        if self.max_segment_records == 0 {
            return Err(SpillError::configuration(
                "rollover count must be greater than zero records",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway_storage::MemoryFactory;

    #[test]
    fn default_options() {
        let options = Options::default();
        assert!(options.rollover_enabled);
        assert_eq!(options.max_segment_bytes, DEFAULT_MAX_SEGMENT_BYTES);
        assert_eq!(options.max_segment_records, u64::MAX);
        assert!(options.delay_error);
        assert!(!options.sync_on_rollover);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let options = Options::new()
            .rollover_every(10)
            .delay_error(false)
            .sync_on_rollover(true)
            .file_factory(MemoryFactory);

        assert_eq!(
            options.rollover_policy(),
            RolloverPolicy::Threshold {
                max_bytes: u64::MAX,
                max_records: 10
            }
        );
        assert!(!options.delay_error);
        assert!(options.sync_on_rollover);
    }

    #[test]
    fn size_rollover_replaces_count() {
        let options = Options::new().rollover_every(5).rollover_size_bytes(100);
        assert_eq!(
            options.rollover_policy(),
            RolloverPolicy::Threshold {
                max_bytes: 100,
                max_records: u64::MAX
            }
        );
    }

    #[test]
    fn disabled_policy_never_rolls() {
        let policy = Options::new().disable_rollover().rollover_policy();
        assert_eq!(policy, RolloverPolicy::Disabled);
        assert!(!policy.should_roll(u64::MAX, u64::MAX));
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = Options::new().rollover_every(3).rollover_policy();
        assert!(!policy.should_roll(1_000, 2));
        assert!(policy.should_roll(1_000, 3));
    }

    #[test]
    fn zero_thresholds_are_rejected() {
        let err = Options::new().rollover_every(0).validate().unwrap_err();
        assert!(matches!(err, SpillError::Configuration { .. }));

        let err = Options::new().rollover_size_bytes(0).validate().unwrap_err();
        assert!(matches!(err, SpillError::Configuration { .. }));

        assert!(Options::new()
            .rollover_every(0)
            .disable_rollover()
            .validate()
            .is_ok());
    }
}
