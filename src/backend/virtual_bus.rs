//! Virtual bus for running without hardware
//!
//! Generates frames for every message in the schema, round-robin, at a
//! fixed interval. Each signal follows its own waveform, so the output looks
//! like live traffic and decodes cleanly against the same schema.
//!
//! # Signal Patterns
//!
//! - [`SignalPattern::Counter`] - Raw value steps up by one and wraps
//! - [`SignalPattern::Sine`] - Sine wave across the signal's raw range
//! - [`SignalPattern::Square`] - Alternates between the range limits
//!
//! # Example
//!
//! ```ignore
//! use canlog_rs::backend::{BufferedSource, VirtualBus};
//!
//! let bus = VirtualBus::new(&schema, Duration::from_millis(100));
//! let source = BufferedSource::spawn(Box::new(bus), 0)?;
//! ```

use super::source::BusReader;
use crate::error::{CanLogError, Result};
use crate::schema::{encode_raw, MessageRule, Schema, SignalRule};
use crate::types::{RawFrame, MAX_PAYLOAD_LEN};
use std::time::{Duration, Instant};

/// Waveform followed by one generated signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Increments by one per frame
    Counter,
    /// Sine with the given period in seconds
    Sine { period: f64 },
    /// Square wave with the given period in seconds
    Square { period: f64 },
}

impl SignalPattern {
    /// Pick a pattern for the n-th signal so neighbouring signals differ
    fn for_index(index: usize) -> Self {
        match index % 3 {
            0 => SignalPattern::Sine { period: 10.0 },
            1 => SignalPattern::Counter,
            _ => SignalPattern::Square { period: 4.0 },
        }
    }

    /// Raw value at `elapsed_secs` for a signal with `counter` frames so far
    fn raw_value(&self, signal: &SignalRule, elapsed_secs: f64, counter: u64) -> u64 {
        let length = signal.length.min(63) as u32;
        let (low, high) = if signal.signed {
            (-(1i64 << (length - 1)), (1i64 << (length - 1)) - 1)
        } else {
            (0, ((1u64 << length) - 1) as i64)
        };

        let value = match *self {
            SignalPattern::Counter => {
                let span = (high - low) as u64 + 1;
                low + (counter % span) as i64
            }
            SignalPattern::Sine { period } => {
                let phase = (2.0 * std::f64::consts::PI * elapsed_secs / period).sin();
                let mid = (low as f64 + high as f64) / 2.0;
                let amplitude = (high as f64 - low as f64) / 2.0;
                (mid + amplitude * phase).round() as i64
            }
            SignalPattern::Square { period } => {
                if elapsed_secs % period < period / 2.0 {
                    high
                } else {
                    low
                }
            }
        };
        value as u64
    }
}

/// Generator for schema-shaped traffic
pub struct VirtualBus {
    name: String,
    messages: Vec<MessageRule>,
    interval: Duration,
    frame_limit: u64,
    produced: u64,
    start: Instant,
    next_due: Instant,
}

impl VirtualBus {
    /// Create a bus that emits one frame every `interval`
    pub fn new(schema: &Schema, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            name: "virtual".to_string(),
            messages: schema.messages().cloned().collect(),
            interval,
            frame_limit: 0,
            produced: 0,
            start: now,
            next_due: now,
        }
    }

    /// Report a disconnect after `limit` frames (0 = never)
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = limit;
        self
    }

    /// Frames generated so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn next_frame(&mut self, now: Instant) -> Option<RawFrame> {
        if self.messages.is_empty() {
            return None;
        }
        let index = (self.produced % self.messages.len() as u64) as usize;
        let round = self.produced / self.messages.len() as u64;
        let message = &self.messages[index];
        let elapsed = now.duration_since(self.start).as_secs_f64();

        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        for (n, signal) in message.signals.iter().enumerate() {
            let raw = SignalPattern::for_index(n).raw_value(signal, elapsed, round);
            encode_raw(signal, raw, &mut payload);
        }

        self.produced += 1;
        Some(RawFrame::with_arrival(
            message.id,
            &payload[..message.dlc],
            now,
        ))
    }
}

impl BusReader for VirtualBus {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        if self.frame_limit > 0 && self.produced >= self.frame_limit {
            return Err(CanLogError::TransportDisconnected(format!(
                "virtual bus ended after {} frames",
                self.produced
            )));
        }

        let now = Instant::now();
        if self.next_due > now {
            let wait = self.next_due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }

        let now = Instant::now();
        self.next_due += self.interval;
        // Do not try to catch up after a long stall
        if self.next_due < now {
            self.next_due = now;
        }
        Ok(self.next_frame(now))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&mut self) {
        tracing::debug!("Virtual bus produced {} frames", self.produced);
    }
}
