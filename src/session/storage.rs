//! File-opening abstraction for the rotating writer
//!
//! The writer never touches `std::fs` directly. It goes through a
//! [`LogOpener`], so rotation can be exercised against an in-memory store.
//!
//! - [`FsOpener`] - Real files, buffered, fsync on [`LogSink::sync`]
//! - [`MemoryOpener`] - In-memory files with failure injection

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// An open log file
pub trait LogSink: Write + Send {
    /// Make everything written so far durable
    fn sync(&mut self) -> io::Result<()>;
}

/// Creates log files and lists existing ones
pub trait LogOpener: Send {
    /// Create a new, empty file. Must not truncate an existing file.
    fn create(&mut self, path: &Path) -> io::Result<Box<dyn LogSink>>;

    /// File names present in `dir`
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;
}

impl LogSink for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_data()
    }
}

/// Opens real files on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FsOpener;

impl LogOpener for FsOpener {
    fn create(&mut self, path: &Path) -> io::Result<Box<dyn LogSink>> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

type FileMap = BTreeMap<PathBuf, Vec<u8>>;

/// In-memory log storage
///
/// Clones share the same files. Bytes become visible through
/// [`MemoryOpener::contents`] only once the sink is flushed, which mirrors
/// what survives a crash of a buffered writer.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    files: Arc<Mutex<FileMap>>,
    fail_writes: Arc<AtomicBool>,
    fail_creates: Arc<AtomicBool>,
}

impl MemoryOpener {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a file already exists
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: &[u8]) {
        self.lock().insert(path.into(), contents.to_vec());
    }

    /// Flushed contents of a file
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.lock()
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// All files in creation-independent (sorted) order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    /// Make every subsequent write or flush fail, as on a full disk
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent create fail, as on a revoked permission
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FileMap> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogOpener for MemoryOpener {
    fn create(&mut self, path: &Path) -> io::Result<Box<dyn LogSink>> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "create disabled",
            ));
        }
        let mut files = self.lock();
        if files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{:?} already exists", path),
            ));
        }
        files.insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            pending: Vec::new(),
            files: Arc::clone(&self.files),
            fail_writes: Arc::clone(&self.fail_writes),
        }))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect())
    }
}

struct MemorySink {
    path: PathBuf,
    pending: Vec<u8>,
    files: Arc<Mutex<FileMap>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySink {
    fn check(&self) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        } else {
            Ok(())
        }
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files
            .entry(self.path.clone())
            .or_default()
            .append(&mut self.pending);
        Ok(())
    }
}

impl LogSink for MemorySink {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_contents_visible_after_flush() {
        let mut opener = MemoryOpener::new();
        let path = PathBuf::from("/logs/a.txt");
        let mut sink = opener.create(&path).unwrap();

        sink.write_all(b"line\n").unwrap();
        assert_eq!(opener.contents(&path).as_deref(), Some(""));

        sink.flush().unwrap();
        assert_eq!(opener.contents(&path).as_deref(), Some("line\n"));
    }

    #[test]
    fn test_memory_create_does_not_truncate() {
        let mut opener = MemoryOpener::new();
        opener.add_file("/logs/a.txt", b"old");
        assert!(opener.create(Path::new("/logs/a.txt")).is_err());
        assert_eq!(opener.contents(Path::new("/logs/a.txt")).as_deref(), Some("old"));
    }

    #[test]
    fn test_memory_list_filters_directory() {
        let opener = MemoryOpener::new();
        opener.add_file("/logs/a.txt", b"");
        opener.add_file("/other/b.txt", b"");
        assert_eq!(opener.list(Path::new("/logs")).unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_memory_write_failure() {
        let mut opener = MemoryOpener::new();
        let mut sink = opener.create(Path::new("/logs/a.txt")).unwrap();
        opener.set_fail_writes(true);
        assert!(sink.write_all(b"x").is_err());
    }

    #[test]
    fn test_fs_opener_creates_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut opener = FsOpener;
        let path = dir.path().join("run_0001.txt");

        let mut sink = opener.create(&path).unwrap();
        sink.write_all(b"hello\n").unwrap();
        sink.sync().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert_eq!(opener.list(dir.path()).unwrap(), vec!["run_0001.txt"]);
        assert!(opener.create(&path).is_err());
    }
}
