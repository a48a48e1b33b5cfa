//! # Spillway Core
//!
//! A buffering stage for pull-based streams that spills to disk.
//!
//! A fast producer is decoupled from a slow consumer: everything the
//! producer emits is appended to a queue, and the consumer pulls from the
//! queue under its own demand. With [`buffer_to_file`] the queue is a chain
//! of segment files, so memory stays flat however far the consumer falls
//! behind; fully read segments are deleted as the reader moves past them.
//!
//! This crate provides:
//! - [`Notification`] - one upstream event (value, error or completion)
//! - [`Queue`] - the queue contract, with [`MemoryQueue`] and [`SpillQueue`]
//! - [`DrainEngine`] - moves notifications to the consumer under demand
//! - [`flow`] - the publisher / subscriber / subscription protocol
//! - [`buffer_to_file`] and [`buffer_in_memory`] - the buffering stage
//!
//! ## Example
//!
//! ```no_run
//! use spillway_codec::serializers;
//! use spillway_core::flow::{IterPublisher, Publisher, Subscriber, Subscription, UNBOUNDED};
//! use spillway_core::{buffer_to_file, DrainMode, Options, SpillError};
//! use std::sync::Arc;
//!
//! struct Print;
//!
//! impl Subscriber<i32> for Print {
//!     fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
//!         subscription.request(UNBOUNDED).unwrap();
//!     }
//!     fn on_next(&self, item: i32) {
//!         println!("{item}");
//!     }
//!     fn on_error(&self, error: SpillError) {
//!         eprintln!("{error}");
//!     }
//!     fn on_complete(&self) {}
//! }
//!
//! let buffered = buffer_to_file(
//!     IterPublisher::range(1, 100),
//!     serializers::integer(),
//!     DrainMode::Synchronous,
//!     Options::new().rollover_every(10),
//! )
//! .unwrap();
//! buffered.subscribe(Arc::new(Print));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod config;
mod drain;
mod error;
mod executor;
pub mod flow;
mod notification;
mod queue;
pub mod spill;

pub use buffer::{buffer_in_memory, buffer_to_file, Buffered};
pub use config::{Options, RolloverPolicy, DEFAULT_MAX_SEGMENT_BYTES};
pub use drain::{DrainEngine, DrainMode};
pub use error::{SpillError, SpillErrorKind, SpillResult};
pub use executor::{Executor, SingleThreadExecutor, Task};
pub use notification::{Notification, NotificationKind};
pub use queue::{MemoryQueue, Queue};
pub use spill::SpillQueue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
