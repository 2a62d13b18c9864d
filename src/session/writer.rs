//! Rotating log writer
//!
//! Owns the active log file and swaps to a new one once the file is older
//! than the configured rotation period. Files are named
//! `<base>_<sequence>.<ext>` with a zero-padded, strictly increasing
//! sequence so a directory listing sorts chronologically.
//!
//! Rotation opens the new file before the old one is released. A record is
//! always written whole into exactly one file.

use super::format::encode_line;
use super::storage::{LogOpener, LogSink};
use crate::config::LogFileConfig;
use crate::error::{CanLogError, Result};
use crate::types::DecodedRecord;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Attempts at finding a free file name before giving up
const MAX_NAME_ATTEMPTS: u32 = 16;

/// File name for a given sequence number
pub fn log_file_name(base_name: &str, sequence: u32, extension: &str) -> String {
    format!("{}_{:04}.{}", base_name, sequence, extension)
}

/// Sequence number of a file written by this writer, if `file_name` is one
pub fn parse_sequence(base_name: &str, extension: &str, file_name: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(base_name)?
        .strip_prefix('_')?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The state of the active file
pub struct RotationState {
    sink: Box<dyn LogSink>,
    path: PathBuf,
    file_start: Instant,
    sequence: u32,
}

impl std::fmt::Debug for RotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationState")
            .field("path", &self.path)
            .field("file_start", &self.file_start)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Appends records to time-rotated log files
pub struct RotatingWriter {
    dir: PathBuf,
    config: LogFileConfig,
    opener: Box<dyn LogOpener>,
    state: Option<RotationState>,
    records_in_file: u64,
}

impl RotatingWriter {
    /// Open the first file in `dir`
    ///
    /// The sequence continues after the highest existing file with the same
    /// base name and extension, so earlier runs are never overwritten.
    pub fn open(
        dir: impl Into<PathBuf>,
        config: LogFileConfig,
        mut opener: Box<dyn LogOpener>,
        now: Instant,
    ) -> Result<Self> {
        let dir = dir.into();
        let existing = opener
            .list(&dir)
            .map_err(|e| CanLogError::persistence(&dir, e))?;
        let highest = existing
            .iter()
            .filter_map(|name| parse_sequence(&config.base_name, &config.extension, name))
            .max()
            .unwrap_or(0);

        let (sink, path, sequence) = create_next(opener.as_mut(), &dir, &config, highest + 1)?;
        tracing::info!("Logging to {:?}", path);

        Ok(Self {
            dir,
            config,
            opener,
            state: Some(RotationState {
                sink,
                path,
                file_start: now,
                sequence,
            }),
            records_in_file: 0,
        })
    }

    /// Append one record and flush it before returning
    pub fn write(&mut self, record: &DecodedRecord) -> Result<()> {
        let line = encode_line(self.config.format, record);
        let sync = self.config.sync_every_record;
        let state = self.active()?;

        if let Err(e) = write_line(state.sink.as_mut(), line.as_bytes(), sync) {
            return Err(CanLogError::persistence(&state.path, e));
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Rotate if the active file is at least one rotation period old
    ///
    /// Returns the new file's path when a rotation happened. The new file's
    /// start time is `now`.
    pub fn maybe_rotate(&mut self, now: Instant) -> Result<Option<PathBuf>> {
        let period = self.config.rotation_period();
        let state = self.active()?;
        if now.saturating_duration_since(state.file_start) < period {
            return Ok(None);
        }
        self.rotate(now).map(Some)
    }

    fn rotate(&mut self, now: Instant) -> Result<PathBuf> {
        let next = self.active()?.sequence + 1;
        let (sink, path, sequence) =
            create_next(self.opener.as_mut(), &self.dir, &self.config, next)?;

        // The new file is live before the old one is touched
        let new_state = RotationState {
            sink,
            path: path.clone(),
            file_start: now,
            sequence,
        };
        let old = self.state.replace(new_state);
        let records = std::mem::replace(&mut self.records_in_file, 0);

        if let Some(mut old) = old {
            old.sink
                .sync()
                .map_err(|e| CanLogError::persistence(&old.path, e))?;
            tracing::info!(
                "Rotated {:?} ({} records) -> {:?}",
                old.path,
                records,
                path
            );
        }
        Ok(path)
    }

    /// Flush, sync and release the active file. Calling it twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state
            .sink
            .sync()
            .map_err(|e| CanLogError::persistence(&state.path, e))?;
        tracing::info!(
            "Closed {:?} ({} records)",
            state.path,
            self.records_in_file
        );
        Ok(())
    }

    /// Path of the active file
    pub fn current_path(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.path.as_path())
    }

    /// Sequence number of the active file
    pub fn sequence(&self) -> Option<u32> {
        self.state.as_ref().map(|s| s.sequence)
    }

    /// Start instant of the active file
    pub fn file_start(&self) -> Option<Instant> {
        self.state.as_ref().map(|s| s.file_start)
    }

    /// Records written to the active file
    pub fn records_in_file(&self) -> u64 {
        self.records_in_file
    }

    /// Destination directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn active(&mut self) -> Result<&mut RotationState> {
        let dir = &self.dir;
        self.state.as_mut().ok_or_else(|| {
            CanLogError::persistence(
                dir,
                io::Error::new(io::ErrorKind::BrokenPipe, "log writer is closed"),
            )
        })
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close log file: {}", e);
        }
    }
}

fn write_line(sink: &mut dyn LogSink, line: &[u8], sync: bool) -> io::Result<()> {
    sink.write_all(line)?;
    sink.flush()?;
    if sync {
        sink.sync()?;
    }
    Ok(())
}

/// Create the first free file at or after `sequence`
fn create_next(
    opener: &mut dyn LogOpener,
    dir: &Path,
    config: &LogFileConfig,
    sequence: u32,
) -> Result<(Box<dyn LogSink>, PathBuf, u32)> {
    let mut sequence = sequence;
    let mut attempts = 0;
    loop {
        let path = dir.join(log_file_name(&config.base_name, sequence, &config.extension));
        match opener.create(&path) {
            Ok(sink) => return Ok((sink, path, sequence)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                tracing::warn!("{:?} already exists, skipping", path);
                sequence += 1;
                attempts += 1;
            }
            Err(e) => return Err(CanLogError::persistence(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::session::storage::{FsOpener, MemoryOpener};
    use crate::types::SignalValue;
    use chrono::Utc;
    use std::time::Duration;

    fn config(period_secs: u64) -> LogFileConfig {
        LogFileConfig {
            base_name: "LEM_Sensor".to_string(),
            rotation_period_secs: period_secs,
            ..Default::default()
        }
    }

    fn record(n: i64) -> DecodedRecord {
        DecodedRecord {
            id: 0x100,
            message: "Counter".into(),
            fields: vec![("n".into(), SignalValue::Integer(n))],
            timestamp: Utc::now(),
        }
    }

    fn lines(store: &MemoryOpener) -> Vec<Vec<String>> {
        store
            .paths()
            .iter()
            .map(|p| {
                store
                    .contents(p)
                    .unwrap_or_default()
                    .lines()
                    .map(String::from)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(log_file_name("LEM_Sensor", 1, "txt"), "LEM_Sensor_0001.txt");
        assert_eq!(log_file_name("run", 12345, "log"), "run_12345.log");
        assert_eq!(parse_sequence("LEM_Sensor", "txt", "LEM_Sensor_0042.txt"), Some(42));
        assert_eq!(parse_sequence("LEM_Sensor", "txt", "LEM_Sensor_.txt"), None);
        assert_eq!(parse_sequence("LEM_Sensor", "txt", "LEM_Sensor_00a1.txt"), None);
        assert_eq!(parse_sequence("LEM_Sensor", "txt", "Other_0001.txt"), None);
        assert_eq!(parse_sequence("LEM_Sensor", "txt", "LEM_Sensor_0001.log"), None);
    }

    #[test]
    fn test_write_is_flushed_immediately() {
        let store = MemoryOpener::new();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open("/logs", config(60), Box::new(store.clone()), clock.now())
                .unwrap();

        writer.write(&record(1)).unwrap();

        let path = writer.current_path().unwrap().to_path_buf();
        assert_eq!(path, PathBuf::from("/logs/LEM_Sensor_0001.txt"));
        assert!(store.contents(&path).unwrap().contains("n=1\n"));
    }

    #[test]
    fn test_no_rotation_before_period() {
        let store = MemoryOpener::new();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open("/logs", config(1), Box::new(store.clone()), clock.now())
                .unwrap();

        clock.advance(Duration::from_millis(999));
        assert_eq!(writer.maybe_rotate(clock.now()).unwrap(), None);
        assert_eq!(writer.sequence(), Some(1));
    }

    #[test]
    fn test_rotation_over_two_and_a_half_periods() {
        let store = MemoryOpener::new();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open("/logs", config(1), Box::new(store.clone()), clock.now())
                .unwrap();

        let mut rotations = Vec::new();
        for n in 0..25 {
            writer.write(&record(n)).unwrap();
            clock.advance(Duration::from_millis(100));
            if let Some(path) = writer.maybe_rotate(clock.now()).unwrap() {
                assert_eq!(writer.file_start(), Some(clock.now()));
                rotations.push(path);
            }
        }
        writer.close().unwrap();

        assert_eq!(rotations.len(), 2);
        let files = lines(&store);
        assert_eq!(files.len(), 3);

        // Every record lands whole in exactly one file, in order
        let all: Vec<String> = files.concat();
        assert_eq!(all.len(), 25);
        for (n, line) in all.iter().enumerate() {
            assert!(line.ends_with(&format!(" n={}", n)), "line {}: {}", n, line);
        }
        assert_eq!(files[0].len(), 10);
        assert_eq!(files[1].len(), 10);
        assert_eq!(files[2].len(), 5);
    }

    #[test]
    fn test_new_file_starts_at_rotation_instant() {
        let store = MemoryOpener::new();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open("/logs", config(1), Box::new(store), clock.now()).unwrap();

        // Checked late: the next file is aged from the rotation, not from the old start
        clock.advance(Duration::from_millis(1700));
        assert!(writer.maybe_rotate(clock.now()).unwrap().is_some());

        clock.advance(Duration::from_millis(500));
        assert!(writer.maybe_rotate(clock.now()).unwrap().is_none());

        clock.advance(Duration::from_millis(500));
        assert!(writer.maybe_rotate(clock.now()).unwrap().is_some());
        assert_eq!(writer.sequence(), Some(3));
    }

    #[test]
    fn test_sequence_continues_after_existing_files() {
        let store = MemoryOpener::new();
        store.add_file("/logs/LEM_Sensor_0007.txt", b"old\n");
        store.add_file("/logs/LEM_Sensor_0003.txt", b"old\n");
        store.add_file("/logs/notes.txt", b"");

        let writer =
            RotatingWriter::open("/logs", config(60), Box::new(store.clone()), Instant::now())
                .unwrap();

        assert_eq!(writer.sequence(), Some(8));
        assert_eq!(
            store.contents(Path::new("/logs/LEM_Sensor_0007.txt")).as_deref(),
            Some("old\n")
        );
    }

    #[test]
    fn test_write_failure_is_persistence_failure() {
        let store = MemoryOpener::new();
        let mut writer =
            RotatingWriter::open("/logs", config(60), Box::new(store.clone()), Instant::now())
                .unwrap();

        store.set_fail_writes(true);
        let err = writer.write(&record(1)).unwrap_err();
        assert!(matches!(err, CanLogError::PersistenceFailure { .. }));
        assert_eq!(writer.records_in_file(), 0);
    }

    #[test]
    fn test_failed_rotation_keeps_old_file() {
        let store = MemoryOpener::new();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open("/logs", config(1), Box::new(store.clone()), clock.now())
                .unwrap();

        store.set_fail_creates(true);
        clock.advance(Duration::from_secs(2));
        let err = writer.maybe_rotate(clock.now()).unwrap_err();

        assert!(matches!(err, CanLogError::PersistenceFailure { .. }));
        assert_eq!(writer.sequence(), Some(1));
        writer.write(&record(1)).unwrap();
    }

    #[test]
    fn test_write_after_close_fails() {
        let store = MemoryOpener::new();
        let mut writer =
            RotatingWriter::open("/logs", config(60), Box::new(store), Instant::now()).unwrap();

        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write(&record(1)).is_err());
        assert!(writer.current_path().is_none());
    }

    #[test]
    fn test_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::default();
        let mut writer =
            RotatingWriter::open(dir.path(), config(1), Box::new(FsOpener), clock.now()).unwrap();

        writer.write(&record(1)).unwrap();
        clock.advance(Duration::from_secs(1));
        writer.maybe_rotate(clock.now()).unwrap();
        writer.write(&record(2)).unwrap();
        writer.close().unwrap();

        let first = std::fs::read_to_string(dir.path().join("LEM_Sensor_0001.txt")).unwrap();
        let second = std::fs::read_to_string(dir.path().join("LEM_Sensor_0002.txt")).unwrap();
        assert!(first.ends_with("n=1\n"));
        assert!(second.ends_with("n=2\n"));

        // A restart picks up where the last run left off
        let writer =
            RotatingWriter::open(dir.path(), config(1), Box::new(FsOpener), clock.now()).unwrap();
        assert_eq!(writer.sequence(), Some(3));
    }
}
