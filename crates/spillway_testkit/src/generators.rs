//! Property-based test generators using proptest.

use proptest::prelude::*;
use spillway_core::Options;

/// A rollover setting to apply to [`Options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollover {
    /// Single segment.
    Disabled,
    /// New segment every `n` records.
    Every(u64),
    /// New segment after `n` bytes.
    Bytes(u64),
}

impl Rollover {
    /// Applies this setting.
    #[must_use]
    pub fn apply(self, options: Options) -> Options {
        match self {
            Self::Disabled => options.disable_rollover(),
            Self::Every(n) => options.rollover_every(n),
            Self::Bytes(n) => options.rollover_size_bytes(n),
        }
    }
}

/// Strategy for rollover settings, biased towards small segments.
pub fn rollover_strategy() -> impl Strategy<Value = Rollover> {
    prop_oneof![
        Just(Rollover::Disabled),
        (1u64..16).prop_map(Rollover::Every),
        (1u64..256).prop_map(Rollover::Bytes),
    ]
}

/// Strategy for a sequence of request sizes, each at least 1.
pub fn request_plan_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..8, 1..64)
}

/// Strategy for string payloads, including empty ones.
pub fn payload_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(".{0,40}", 0..100)
}
