//! Heap-backed segment store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// A segment store that lives on the heap.
///
/// Appended bytes are visible to `read_at` immediately, so `flush` and
/// `sync` are no-ops. Useful for exercising segment logic without touching
/// the file system.
///
/// # Example
///
/// ```rust
/// use spillway_storage::{InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// let offset = backend.append(b"frame").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 5);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    destroyed: AtomicBool,
}

impl InMemoryBackend {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing bytes.
    ///
    /// Useful for feeding hand-crafted or corrupted frames to a reader.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Copies out everything appended so far.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_destroyed() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&self, bytes: &[u8]) -> StorageResult<u64> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&self) -> StorageResult<()> {
        self.ensure_open()
    }

    fn sync(&self) -> StorageResult<()> {
        self.ensure_open()
    }

    fn size(&self) -> StorageResult<u64> {
        self.ensure_open()?;
        Ok(self.data.read().len() as u64)
    }

    fn destroy(&self) -> StorageResult<()> {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            let mut data = self.data.write();
            data.clear();
            data.shrink_to_fit();
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_append_and_read() {
        let backend = InMemoryBackend::new();

        let offset1 = backend.append(b"hello").unwrap();
        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset1, 0);
        assert_eq!(offset2, 5);

        assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"abc".to_vec());
        let result = backend.read_at(2, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_has_no_location() {
        assert!(InMemoryBackend::new().location().is_none());
    }

    #[test]
    fn memory_destroy_releases_data() {
        let backend = InMemoryBackend::with_data(vec![1, 2, 3]);
        backend.destroy().unwrap();

        assert!(backend.is_destroyed());
        assert!(backend.data().is_empty());
        assert!(matches!(backend.append(b"x"), Err(StorageError::Closed)));
        assert!(backend.destroy().is_ok());
    }

    proptest! {
        #[test]
        fn memory_appends_concatenate(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..32)
        ) {
            let backend = InMemoryBackend::new();
            for chunk in &chunks {
                backend.append(chunk).unwrap();
            }
            prop_assert_eq!(backend.data(), chunks.concat());
        }
    }
}
