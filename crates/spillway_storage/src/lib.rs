//! # Spillway Storage
//!
//! Backing byte stores for Spillway segment files.
//!
//! Backends are **opaque byte stores**: they do not interpret the data they
//! hold. The spillover queue in `spillway_core` owns the record framing and
//! decides when a store is created, sealed and destroyed.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (append, read, flush, destroy)
//! - Appends and reads may happen concurrently from different threads
//! - A backend can be destroyed exactly once; afterwards every call fails
//!   with [`StorageError::Closed`]
//! - New backends are obtained from a [`SegmentFactory`]
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one file per segment, the default for spilling
//! - [`InMemoryBackend`] - for tests and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use spillway_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod factory;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use factory::{FileFactory, MemoryFactory, SegmentFactory};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
