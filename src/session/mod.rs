//! Acquisition log files
//!
//! Decoded records are persisted to rotating text files, one record per
//! line. The writer is independent of the file system: file creation goes
//! through a [`LogOpener`] and the current time is passed in by the caller.
//!
//! # Features
//!
//! - Age-based rotation with a strictly increasing file sequence
//! - Sequence continuation across restarts
//! - Key/value or JSON lines output
//! - Durable flush on every write, fsync on rotation and close

pub mod format;
pub mod storage;
pub mod writer;

pub use format::encode_line;
pub use storage::{FsOpener, LogOpener, LogSink, MemoryOpener};
pub use writer::{log_file_name, parse_sequence, RotatingWriter, RotationState};
