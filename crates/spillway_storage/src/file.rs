//! File-based storage backend for spill segments.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Write buffer in front of the segment file.
const WRITE_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// A file-based storage backend.
///
/// The file is opened twice: a buffered append handle used by the producer
/// side and a plain read handle used by the consumer side. The two never
/// contend on the same lock, so a slow reader does not stall writes.
///
/// # Durability
///
/// - `flush()` empties the write buffer into the OS, after which the read
///   handle can observe the bytes
/// - `sync()` additionally calls `File::sync_all()`
///
/// Data is not expected to survive a process restart; `destroy()` removes
/// the file.
///
/// # Example
///
/// ```no_run
/// use spillway_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::create(Path::new("segment-000001.seg")).unwrap();
/// let offset = backend.append(b"spilled").unwrap();
/// backend.flush().unwrap();
/// assert_eq!(backend.read_at(offset, 7).unwrap(), b"spilled");
/// backend.destroy().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    reader: Mutex<Option<File>>,
    size: AtomicU64,
    destroyed: AtomicBool,
}

impl FileBackend {
    /// Creates (or truncates) the file at `path`.
    ///
    /// Parent directories are created if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn create(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let write_handle = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let read_handle = File::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(BufWriter::with_capacity(
                WRITE_BUFFER_SIZE,
                write_handle,
            ))),
            reader: Mutex::new(Some(read_handle)),
            size: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Opens an existing file for reading only.
    ///
    /// Appends on the returned backend fail with [`StorageError::Closed`].
    /// Used to inspect segments left behind by another process.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let read_handle = File::open(path)?;
        let size = read_handle.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(None),
            reader: Mutex::new(Some(read_handle)),
            size: AtomicU64::new(size),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut reader = self.reader.lock();
        let file = reader.as_mut().ok_or(StorageError::Closed)?;

        let size = self.size.load(Ordering::Acquire);
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&self, data: &[u8]) -> StorageResult<u64> {
        let mut writer = self.writer.lock();
        let out = writer.as_mut().ok_or(StorageError::Closed)?;

        let offset = self.size.load(Ordering::Acquire);
        if data.is_empty() {
            return Ok(offset);
        }

        out.write_all(data)?;
        self.size.fetch_add(data.len() as u64, Ordering::AcqRel);

        Ok(offset)
    }

    fn flush(&self) -> StorageResult<()> {
        let mut writer = self.writer.lock();
        writer.as_mut().ok_or(StorageError::Closed)?.flush()?;
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        let mut writer = self.writer.lock();
        let out = writer.as_mut().ok_or(StorageError::Closed)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        if self.is_destroyed() {
            return Err(StorageError::Closed);
        }
        Ok(self.size.load(Ordering::Acquire))
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn destroy(&self) -> StorageResult<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Close both handles before unlinking.
        drop(self.writer.lock().take());
        drop(self.reader.lock().take());

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_append_flush_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let backend = FileBackend::create(&path).unwrap();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);

        backend.flush().unwrap();
        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_read_partial() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::create(&dir.path().join("test.seg")).unwrap();
        backend.append(b"hello world").unwrap();
        backend.flush().unwrap();

        let data = backend.read_at(6, 5).unwrap();
        assert_eq!(&data, b"world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::create(&dir.path().join("test.seg")).unwrap();
        backend.append(b"hello").unwrap();
        backend.flush().unwrap();

        let result = backend.read_at(3, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_interleaved_append_and_read() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::create(&dir.path().join("test.seg")).unwrap();

        for i in 0u8..50 {
            let offset = backend.append(&[i; 3]).unwrap();
            backend.flush().unwrap();
            assert_eq!(backend.read_at(offset, 3).unwrap(), vec![i; 3]);
        }
        assert_eq!(backend.size().unwrap(), 150);
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("test.seg");

        let backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.location(), Some(path.as_path()));
    }

    #[test]
    fn file_destroy_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");

        let backend = FileBackend::create(&path).unwrap();
        backend.append(b"data").unwrap();
        backend.destroy().unwrap();

        assert!(!path.exists());
        assert!(backend.is_destroyed());
        assert!(matches!(backend.append(b"x"), Err(StorageError::Closed)));
        assert!(matches!(backend.read_at(0, 1), Err(StorageError::Closed)));
        assert!(matches!(backend.size(), Err(StorageError::Closed)));
    }

    #[test]
    fn file_destroy_twice_is_noop() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::create(&dir.path().join("test.seg")).unwrap();

        backend.destroy().unwrap();
        backend.destroy().unwrap();
    }

    #[test]
    fn file_destroy_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");
        let backend = FileBackend::create(&path).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(backend.destroy().is_ok());
    }

    #[test]
    fn file_flush_and_sync() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::create(&dir.path().join("test.seg")).unwrap();
        backend.append(b"data").unwrap();

        assert!(backend.flush().is_ok());
        assert!(backend.sync().is_ok());
    }

    #[test]
    fn file_open_existing_is_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.seg");
        {
            let backend = FileBackend::create(&path).unwrap();
            backend.append(b"left behind").unwrap();
            backend.flush().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(5, 6).unwrap(), b"behind");
        assert!(matches!(backend.append(b"x"), Err(StorageError::Closed)));
    }

    #[test]
    fn file_open_missing_fails() {
        let dir = tempdir().unwrap();
        assert!(FileBackend::open(&dir.path().join("absent.seg")).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn file_appends_read_back_at_their_offsets(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..512), 1..32)
        ) {
            let dir = tempdir().unwrap();
            let backend = FileBackend::create(&dir.path().join("prop.seg")).unwrap();

            let mut offsets = Vec::new();
            let mut expected = 0u64;
            for chunk in &chunks {
                let offset = backend.append(chunk).unwrap();
                prop_assert_eq!(offset, expected);
                expected += chunk.len() as u64;
                offsets.push(offset);
            }
            backend.flush().unwrap();
            prop_assert_eq!(backend.size().unwrap(), expected);

            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
            backend.destroy().unwrap();
        }
    }
}
