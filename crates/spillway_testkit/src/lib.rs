//! # Spillway Testkit
//!
//! Test utilities for Spillway.
//!
//! This crate provides:
//! - [`TestSubscriber`], a recording subscriber with waits and assertions
//! - [`TrackingFactory`] and [`SpillDir`] for asserting segment cleanup
//! - Producers for scenario tests (threaded, paced, failing)
//! - Property-based test generators using proptest
//!
//! Cross-crate scenario tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use spillway_codec::serializers;
//! use spillway_core::flow::{IterPublisher, Publisher};
//! use spillway_core::{buffer_to_file, DrainMode};
//! use spillway_testkit::prelude::*;
//!
//! let dir = SpillDir::new();
//! let buffered = buffer_to_file(
//!     IterPublisher::range(1, 100),
//!     serializers::integer(),
//!     DrainMode::Synchronous,
//!     dir.options().rollover_every(10),
//! )
//! .unwrap();
//!
//! let subscriber = TestSubscriber::new().shared();
//! buffered.subscribe(subscriber.clone());
//! subscriber.assert_values(&(1..=100).collect::<Vec<_>>());
//! subscriber.assert_completed();
//! dir.assert_empty();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod sources;
pub mod subscriber;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::sources::*;
    pub use crate::subscriber::*;
}

pub use fixtures::*;
pub use generators::*;
pub use sources::*;
pub use subscriber::*;
