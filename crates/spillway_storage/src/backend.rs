//! Storage backend trait definition.

use crate::error::StorageResult;
use std::fmt;
use std::path::Path;

/// A low-level byte store backing one spill segment.
///
/// Backends are **opaque byte stores**. The spillover queue owns the record
/// format; a backend only appends, reads back and eventually destroys bytes.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset,
///   provided they were covered by a completed `flush`
/// - `append` and `read_at` may be called concurrently from different
///   threads; implementations use interior locking
/// - after `destroy` every call returns [`crate::StorageError::Closed`]
///   (a second `destroy` is a no-op)
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the current size, the
    /// backend is destroyed, or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written. The bytes are not
    /// guaranteed to be visible to `read_at` until the next `flush`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is destroyed or an I/O error occurs.
    fn append(&self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered appends down so that `read_at` can observe them.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Flushes and asks the OS to persist data and metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Returns the number of bytes appended so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is destroyed.
    fn size(&self) -> StorageResult<u64>;

    /// Returns the file system location of this store, if it has one.
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Releases the store and removes its bytes from the underlying medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium refuses the removal.
    fn destroy(&self) -> StorageResult<()>;

    /// Returns `true` once `destroy` has been called.
    fn is_destroyed(&self) -> bool;
}
