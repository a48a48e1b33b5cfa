//! Factories handing out fresh backing stores for new segments.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the backing store for each new segment.
///
/// `sequence` is the segment's position within its queue, starting at 1.
/// A factory may be shared by many queues, so implementations must not
/// derive file identity from `sequence` alone.
pub trait SegmentFactory: Send + Sync + fmt::Debug {
    /// Creates an empty backing store for segment `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created.
    fn create(&self, sequence: u64) -> StorageResult<Box<dyn StorageBackend>>;
}

type PathFn = dyn Fn(u64) -> PathBuf + Send + Sync;

/// Creates one [`FileBackend`] per segment.
///
/// # Example
///
/// ```rust
/// use spillway_storage::{FileFactory, SegmentFactory, StorageBackend};
///
/// let factory = FileFactory::temp();
/// let segment = factory.create(1).unwrap();
/// assert!(segment.location().unwrap().exists());
/// segment.destroy().unwrap();
/// ```
#[derive(Clone)]
pub struct FileFactory {
    paths: Arc<PathFn>,
    label: String,
}

impl FileFactory {
    /// Places segment files in the system temporary directory.
    #[must_use]
    pub fn temp() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    /// Places uniquely named segment files in `dir`.
    ///
    /// File names look like `spillway-<uuid>-000001.seg`.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let label = dir.display().to_string();
        let paths = move |sequence: u64| {
            dir.join(format!(
                "spillway-{}-{sequence:06}.seg",
                Uuid::new_v4().simple()
            ))
        };
        Self {
            paths: Arc::new(paths),
            label,
        }
    }

    /// Uses `paths` to name every segment file.
    ///
    /// The closure must return a distinct path on every call.
    pub fn with_paths<F>(paths: F) -> Self
    where
        F: Fn(u64) -> PathBuf + Send + Sync + 'static,
    {
        Self {
            paths: Arc::new(paths),
            label: "custom".to_string(),
        }
    }
}

impl Default for FileFactory {
    fn default() -> Self {
        Self::temp()
    }
}

impl fmt::Debug for FileFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFactory")
            .field("location", &self.label)
            .finish_non_exhaustive()
    }
}

impl SegmentFactory for FileFactory {
    fn create(&self, sequence: u64) -> StorageResult<Box<dyn StorageBackend>> {
        let path = (self.paths)(sequence);
        Ok(Box::new(FileBackend::create(&path)?))
    }
}

/// Creates one [`InMemoryBackend`] per segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFactory;

impl SegmentFactory for MemoryFactory {
    fn create(&self, _sequence: u64) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(InMemoryBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_dir_creates_distinct_files() {
        let dir = tempdir().unwrap();
        let factory = FileFactory::in_dir(dir.path());

        let a = factory.create(1).unwrap();
        let b = factory.create(1).unwrap();

        let pa = a.location().unwrap().to_path_buf();
        let pb = b.location().unwrap().to_path_buf();
        assert_ne!(pa, pb);
        assert!(pa.starts_with(dir.path()));
        assert!(pa.extension().is_some_and(|e| e == "seg"));

        a.destroy().unwrap();
        b.destroy().unwrap();
        assert!(!pa.exists());
        assert!(!pb.exists());
    }

    #[test]
    fn with_paths_uses_closure() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_path_buf();
        let factory = FileFactory::with_paths(move |seq| base.join(format!("seg-{seq}")));

        let segment = factory.create(7).unwrap();
        assert_eq!(segment.location().unwrap(), dir.path().join("seg-7"));
    }

    #[test]
    fn memory_factory_creates_empty_backends() {
        let segment = MemoryFactory.create(1).unwrap();
        assert_eq!(segment.size().unwrap(), 0);
        assert!(segment.location().is_none());
    }

    #[test]
    fn debug_does_not_leak_closure() {
        let factory = FileFactory::with_paths(|seq| PathBuf::from(format!("{seq}")));
        let rendered = format!("{factory:?}");
        assert!(rendered.contains("FileFactory"));
    }
}
