//! Segment directories and factories that remember what they created.

use parking_lot::Mutex;
use spillway_core::Options;
use spillway_storage::{
    FileFactory, SegmentFactory, StorageBackend, StorageError, StorageResult,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A file factory that records every path it hands out and every destroy
/// call its segments receive.
///
/// Clones share the record, so a clone can go into [`Options`] while the
/// test keeps the original for assertions.
#[derive(Debug, Clone)]
pub struct TrackingFactory {
    inner: FileFactory,
    created: Arc<Mutex<Vec<PathBuf>>>,
    destroyed: Arc<Mutex<Vec<PathBuf>>>,
}

impl TrackingFactory {
    /// Creates segment files under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: FileFactory::in_dir(dir),
            created: Arc::new(Mutex::new(Vec::new())),
            destroyed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every path created so far, in creation order.
    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().clone()
    }

    /// Number of segments created so far.
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Every destroy call so far, in call order, repeats included.
    pub fn destroyed(&self) -> Vec<PathBuf> {
        self.destroyed.lock().clone()
    }

    /// Asserts that every created segment was destroyed exactly once.
    ///
    /// # Panics
    ///
    /// Panics if a segment was never destroyed or destroyed twice.
    pub fn assert_each_destroyed_once(&self) {
        let mut created = self.created();
        let mut destroyed = self.destroyed();
        created.sort();
        destroyed.sort();
        assert_eq!(destroyed, created, "destroy calls do not match segments");
    }

    /// Created paths that still exist on disk.
    pub fn remaining(&self) -> Vec<PathBuf> {
        self.created
            .lock()
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }
}

impl SegmentFactory for TrackingFactory {
    fn create(&self, sequence: u64) -> StorageResult<Box<dyn StorageBackend>> {
        let inner = self.inner.create(sequence)?;
        let path = inner.location().map(Path::to_path_buf);
        if let Some(path) = &path {
            self.created.lock().push(path.clone());
        }
        Ok(Box::new(TrackedBackend {
            inner,
            path,
            destroyed: Arc::clone(&self.destroyed),
        }))
    }
}

#[derive(Debug)]
struct TrackedBackend {
    inner: Box<dyn StorageBackend>,
    path: Option<PathBuf>,
    destroyed: Arc<Mutex<Vec<PathBuf>>>,
}

impl StorageBackend for TrackedBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&self, data: &[u8]) -> StorageResult<u64> {
        self.inner.append(data)
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn location(&self) -> Option<&Path> {
        self.inner.location()
    }

    fn destroy(&self) -> StorageResult<()> {
        if let Some(path) = &self.path {
            self.destroyed.lock().push(path.clone());
        }
        self.inner.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

/// A factory whose segments start failing appends after a set number of
/// successful ones, counted across all segments it created.
#[derive(Debug, Clone)]
pub struct FaultyFactory {
    inner: TrackingFactory,
    appends: Arc<AtomicUsize>,
    fail_after: usize,
}

impl FaultyFactory {
    /// Lets `fail_after` appends through, then fails every append.
    pub fn new(inner: TrackingFactory, fail_after: usize) -> Self {
        Self {
            inner,
            appends: Arc::new(AtomicUsize::new(0)),
            fail_after,
        }
    }

    /// Number of append attempts so far, failed ones included.
    pub fn append_attempts(&self) -> usize {
        self.appends.load(Ordering::Acquire)
    }
}

impl SegmentFactory for FaultyFactory {
    fn create(&self, sequence: u64) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(FaultyBackend {
            inner: self.inner.create(sequence)?,
            appends: Arc::clone(&self.appends),
            fail_after: self.fail_after,
        }))
    }
}

#[derive(Debug)]
struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    appends: Arc<AtomicUsize>,
    fail_after: usize,
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&self, data: &[u8]) -> StorageResult<u64> {
        if self.appends.fetch_add(1, Ordering::AcqRel) >= self.fail_after {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected append failure",
            )));
        }
        self.inner.append(data)
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn location(&self) -> Option<&Path> {
        self.inner.location()
    }

    fn destroy(&self) -> StorageResult<()> {
        self.inner.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

/// A temporary directory for segment files, removed on drop.
pub struct SpillDir {
    dir: TempDir,
    factory: TrackingFactory,
}

impl SpillDir {
    /// Creates an empty directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let factory = TrackingFactory::in_dir(dir.path());
        Self { dir, factory }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The tracking factory writing into this directory.
    pub fn factory(&self) -> &TrackingFactory {
        &self.factory
    }

    /// Default options writing segments into this directory.
    pub fn options(&self) -> Options {
        Options::new().file_factory(self.factory.clone())
    }

    /// Default options whose segments fail after `fail_after` appends.
    pub fn faulty_options(&self, fail_after: usize) -> Options {
        Options::new().file_factory(FaultyFactory::new(self.factory.clone(), fail_after))
    }

    /// Number of files currently in the directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be read.
    pub fn file_count(&self) -> usize {
        fs::read_dir(self.dir.path())
            .expect("Failed to read spill directory")
            .count()
    }

    /// Asserts the directory is empty.
    ///
    /// # Panics
    ///
    /// Panics if any file is left.
    pub fn assert_empty(&self) {
        assert_eq!(
            self.factory.remaining(),
            Vec::<PathBuf>::new(),
            "segment files left behind"
        );
        assert_eq!(self.file_count(), 0, "stray files in spill directory");
    }
}

impl Default for SpillDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_factory_records_paths() {
        let dir = SpillDir::new();
        let a = dir.factory().create(1).unwrap();
        let b = dir.factory().create(2).unwrap();

        assert_eq!(dir.factory().created_count(), 2);
        assert_eq!(dir.factory().remaining().len(), 2);
        assert_eq!(dir.file_count(), 2);

        a.destroy().unwrap();
        assert_eq!(dir.factory().remaining().len(), 1);
        b.destroy().unwrap();
        dir.assert_empty();
    }

    #[test]
    fn tracking_factory_counts_destroy_calls() {
        let dir = SpillDir::new();
        let a = dir.factory().create(1).unwrap();
        let b = dir.factory().create(2).unwrap();
        a.destroy().unwrap();
        b.destroy().unwrap();
        dir.factory().assert_each_destroyed_once();

        b.destroy().unwrap();
        assert_eq!(dir.factory().destroyed().len(), 3);
    }

    #[test]
    fn faulty_factory_fails_after_limit() {
        let dir = SpillDir::new();
        let factory = FaultyFactory::new(dir.factory().clone(), 2);
        let first = factory.create(1).unwrap();
        first.append(b"a").unwrap();
        let second = factory.create(2).unwrap();
        second.append(b"b").unwrap();
        assert!(matches!(second.append(b"c"), Err(StorageError::Io(_))));
        assert_eq!(factory.append_attempts(), 3);

        first.destroy().unwrap();
        second.destroy().unwrap();
        dir.assert_empty();
    }

    #[test]
    fn clones_share_the_record() {
        let dir = SpillDir::new();
        let clone = dir.factory().clone();
        let segment = clone.create(1).unwrap();
        assert_eq!(dir.factory().created_count(), 1);
        segment.destroy().unwrap();
    }
}
