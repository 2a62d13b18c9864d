//! Display data published by the acquisition loop.
//!
//! The `Topics` struct is a plain data bus, direct field access. The app
//! writes to it from `process_backend_messages()` and the panels read it.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::backend::BackendMessage;
use crate::types::{AcquisitionStats, DecodedRecord, LoopState};

/// Scrolling text shown to the operator, capped at a fixed number of lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    max_lines: usize,
}

/// One line of the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    /// Decode errors are rendered differently from records.
    pub is_error: bool,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(4096)),
            max_lines: max_lines.max(1),
        }
    }

    /// Append a line, discarding the oldest once full.
    pub fn push(&mut self, text: String, is_error: bool) {
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine { text, is_error });
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogLine> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Display text for one record: signal values after the message name.
pub fn record_line(record: &DecodedRecord) -> String {
    let mut line = format!(
        "{} {}",
        record.timestamp.format("%H:%M:%S%.3f"),
        record.message
    );
    for (name, value) in &record.fields {
        line.push_str(&format!(" {}={}", name, value));
    }
    line
}

/// All data published by the backend and consumed by the panels.
#[derive(Debug, Clone)]
pub struct Topics {
    /// Acquisition loop state
    pub state: LoopState,
    /// Latest statistics (about 2 Hz, plus on every state change)
    pub stats: AcquisitionStats,
    /// File currently being written
    pub current_file: Option<PathBuf>,
    /// Reason the run ended abnormally
    pub fatal_error: Option<String>,
    /// Most recent skipped frame
    pub last_decode_error: Option<String>,
    /// Decode errors seen by the UI, independent of stats updates
    pub decode_errors_seen: u64,
    /// Set once the loop has exited
    pub shutdown: bool,
    /// Records and decode errors
    pub log: LogBuffer,
}

impl Topics {
    pub fn new(max_lines: usize) -> Self {
        Self {
            state: LoopState::Starting,
            stats: AcquisitionStats::default(),
            current_file: None,
            fatal_error: None,
            last_decode_error: None,
            decode_errors_seen: 0,
            shutdown: false,
            log: LogBuffer::new(max_lines),
        }
    }

    /// Fold one backend message into the published state.
    pub fn apply(&mut self, msg: BackendMessage) {
        match msg {
            BackendMessage::Record(record) => {
                self.log.push(record_line(&record), false);
            }
            BackendMessage::DecodeError { id, error } => {
                self.decode_errors_seen += 1;
                self.log.push(format!("[skipped 0x{:X}] {}", id, error), true);
                self.last_decode_error = Some(error);
            }
            BackendMessage::State(state) => {
                self.state = state;
            }
            BackendMessage::Rotated(path) => {
                self.log
                    .push(format!("[rotated] now writing {}", path.display()), false);
                self.current_file = Some(path);
            }
            BackendMessage::Stats(stats) => {
                if stats.current_file.is_some() {
                    self.current_file = stats.current_file.clone();
                }
                self.stats = stats;
            }
            BackendMessage::Fatal(error) => {
                self.log.push(format!("[fatal] {}", error), true);
                self.fatal_error = Some(error);
            }
            BackendMessage::Shutdown => {
                self.shutdown = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalValue;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_log_buffer_caps_lines() {
        let mut log = LogBuffer::new(3);
        for i in 0..5 {
            log.push(format!("line {}", i), false);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.get(0).unwrap().text, "line 2");
        assert_eq!(log.get(2).unwrap().text, "line 4");
    }

    #[test]
    fn test_record_line() {
        let record = DecodedRecord {
            id: 0x100,
            message: "VehicleSpeed".into(),
            fields: vec![("speed".into(), SignalValue::Float(10.0))],
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(record_line(&record), "12:00:00.000 VehicleSpeed speed=10.0");
    }

    #[test]
    fn test_apply_messages() {
        let mut topics = Topics::new(100);
        topics.apply(BackendMessage::State(LoopState::Running));
        topics.apply(BackendMessage::DecodeError {
            id: 0x7FF,
            error: "Unknown frame identifier 0x7FF".into(),
        });
        topics.apply(BackendMessage::Rotated(PathBuf::from("/logs/LEM_Sensor_0002.txt")));
        topics.apply(BackendMessage::Fatal("Transport disconnected: gone".into()));
        topics.apply(BackendMessage::Shutdown);

        assert_eq!(topics.state, LoopState::Running);
        assert_eq!(topics.decode_errors_seen, 1);
        assert!(topics.log.get(0).unwrap().is_error);
        assert_eq!(
            topics.current_file,
            Some(PathBuf::from("/logs/LEM_Sensor_0002.txt"))
        );
        assert!(topics.fatal_error.is_some());
        assert!(topics.shutdown);
    }
}
