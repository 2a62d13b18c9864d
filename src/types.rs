//! Core data types for CanLog-RS
//!
//! This module contains the data structures that flow through the
//! acquisition pipeline.
//!
//! # Main Types
//!
//! - [`RawFrame`] - A frame as delivered by the bus (identifier + payload)
//! - [`SignalValue`] - A typed, scaled signal value
//! - [`DecodedRecord`] - The decoded signals of one frame plus a timestamp
//! - [`LoopState`] - Lifecycle state of the acquisition loop
//! - [`AcquisitionStats`] - Counters surfaced to the operator

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Largest payload carried by a classic CAN frame
pub const MAX_PAYLOAD_LEN: usize = 8;

/// A raw frame received from the bus
///
/// Immutable once received. Up to 8 payload bytes are stored inline; `len`
/// is the length the bus reported, which may exceed what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    /// Arbitration identifier (11 or 29 bit)
    pub id: u32,
    data: [u8; MAX_PAYLOAD_LEN],
    len: usize,
    /// Monotonic arrival time
    pub arrival: Instant,
}

impl RawFrame {
    /// Create a frame arriving now
    pub fn new(id: u32, payload: &[u8]) -> Self {
        Self::with_arrival(id, payload, Instant::now())
    }

    /// Create a frame with an explicit arrival instant
    ///
    /// An oversize payload keeps its reported length so the decoder can
    /// reject it; only the first 8 bytes are stored.
    pub fn with_arrival(id: u32, payload: &[u8], arrival: Instant) -> Self {
        let stored = payload.len().min(MAX_PAYLOAD_LEN);
        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..stored].copy_from_slice(&payload[..stored]);
        Self {
            id,
            data,
            len: payload.len(),
            arrival,
        }
    }

    /// The stored payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_PAYLOAD_LEN)]
    }

    /// Payload length in bytes, as reported by the bus
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length frames
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A decoded signal value
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Unscaled integer signal
    Integer(i64),
    /// Scaled physical value
    Float(f64),
    /// Raw value named by the schema's choice table
    Choice(String),
}

impl SignalValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Choice(_) => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            // Debug keeps the decimal point on whole floats (10.0, not 10)
            SignalValue::Float(v) => write!(f, "{:?}", v),
            SignalValue::Choice(label) => write!(f, "{:?}", label),
        }
    }
}

impl Serialize for SignalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SignalValue::Integer(v) => serializer.serialize_i64(*v),
            SignalValue::Float(v) => serializer.serialize_f64(*v),
            SignalValue::Choice(label) => serializer.serialize_str(label),
        }
    }
}

/// The decoded signals of exactly one frame
///
/// `fields` keeps the schema's signal order. No mutation after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Identifier of the source frame
    pub id: u32,
    /// Message name from the schema
    pub message: String,
    /// Signal name to value, in schema order
    pub fields: Vec<(String, SignalValue)>,
    /// Wall-clock time at decode
    pub timestamp: DateTime<Utc>,
}

impl DecodedRecord {
    /// Look up a signal value by name
    pub fn get(&self, name: &str) -> Option<&SignalValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Signal names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// Lifecycle state of the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Waiting for the output directory
    #[default]
    Starting,
    /// Receiving, decoding and writing
    Running,
    /// Blocked in the pause gate
    Paused,
    /// Finishing the in-flight iteration and releasing resources
    Stopping,
    /// Terminal
    Stopped,
}

impl LoopState {
    /// True once no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Starting => write!(f, "Starting"),
            LoopState::Running => write!(f, "Running"),
            LoopState::Paused => write!(f, "Paused"),
            LoopState::Stopping => write!(f, "Stopping..."),
            LoopState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Counters for one acquisition run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionStats {
    /// Frames delivered by the source
    pub frames_received: u64,
    /// Records written to the log
    pub records_written: u64,
    /// Frames whose identifier is not in the schema
    pub unknown_identifiers: u64,
    /// Frames whose payload length did not match the schema
    pub malformed_payloads: u64,
    /// Number of file rotations
    pub rotations: u64,
    /// Display messages dropped because the UI was not keeping up
    pub dropped_messages: u64,
    /// Log file currently being written
    pub current_file: Option<PathBuf>,
}

impl AcquisitionStats {
    /// Total recoverable decode errors
    pub fn decode_errors(&self) -> u64 {
        self.unknown_identifiers + self.malformed_payloads
    }
}
