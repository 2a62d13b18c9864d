//! Acquisition Worker Thread Implementation
//!
//! This module contains the acquisition loop that runs in a separate thread.
//! It owns the frame source and the rotating writer; the UI only ever sees
//! it through the display channel and the control points.
//!
//! # Responsibilities
//!
//! - **Startup**: Waits for the output directory, then opens the first file
//! - **Acquisition**: Receives, decodes and writes frames in arrival order
//! - **Pausing**: Blocks in the pause gate without dropping queued frames
//! - **Rotation**: Asks the writer to rotate after every iteration
//! - **Feedback**: Sends records, decode errors and statistics to the UI
//! - **Shutdown**: Closes the writer and the source on stop or fatal error
//!
//! # Error Policy
//!
//! Unknown identifiers and malformed payloads are counted and reported, and
//! the loop carries on. Transport and persistence failures end the run.

use crate::backend::control::{DestinationReceiver, PauseGate, RunLatch};
use crate::backend::source::FrameSource;
use crate::backend::BackendMessage;
use crate::clock::Clock;
use crate::config::{AcquisitionConfig, LogFileConfig};
use crate::error::{CanLogError, Result};
use crate::schema::SchemaDecoder;
use crate::session::{LogOpener, RotatingWriter};
use crate::types::{AcquisitionStats, LoopState, RawFrame};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between statistics updates sent to the UI
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Everything the acquisition loop needs, assembled by the backend
pub struct AcquisitionWorker {
    pub(crate) source: Box<dyn FrameSource>,
    pub(crate) decoder: SchemaDecoder,
    pub(crate) opener: Option<Box<dyn LogOpener>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) logging: LogFileConfig,
    pub(crate) acquisition: AcquisitionConfig,
    pub(crate) gate: Arc<PauseGate>,
    pub(crate) latch: RunLatch,
    pub(crate) destination: DestinationReceiver,
    pub(crate) message_tx: Sender<BackendMessage>,
    pub(crate) display_capacity: usize,
    pub(crate) state: LoopState,
    pub(crate) stats: AcquisitionStats,
    pub(crate) last_stats_time: Instant,
}

impl AcquisitionWorker {
    /// Run the loop to completion
    ///
    /// Returns the final statistics on a normal stop, or the error that
    /// ended the run.
    pub fn run(mut self) -> Result<AcquisitionStats> {
        tracing::info!("Acquisition worker started");
        let result = self.run_inner();

        if let Err(ref e) = result {
            tracing::error!("Acquisition ended: {}", e);
            self.notify(BackendMessage::Fatal(e.to_string()));
        }

        // Let the dispatcher go whatever the reason for leaving
        self.latch.stop();
        self.gate.wake_all();

        self.set_state(LoopState::Stopped);
        self.notify(BackendMessage::Stats(self.stats.clone()));
        self.notify(BackendMessage::Shutdown);
        tracing::info!(
            "Acquisition worker stopped: {} frames, {} records, {} decode errors",
            self.stats.frames_received,
            self.stats.records_written,
            self.stats.decode_errors()
        );

        result.map(|()| self.stats)
    }

    fn run_inner(&mut self) -> Result<()> {
        self.set_state(LoopState::Starting);
        let dir = match self.destination.wait(&self.latch) {
            Ok(dir) => dir,
            Err(e) => {
                self.source.close();
                return Err(e);
            }
        };

        let Some(opener) = self.opener.take() else {
            self.source.close();
            return Err(CanLogError::Config("log opener already used".to_string()));
        };
        let mut writer =
            match RotatingWriter::open(&dir, self.logging.clone(), opener, self.clock.now()) {
                Ok(writer) => writer,
                Err(e) => {
                    self.source.close();
                    return Err(e);
                }
            };
        self.stats.current_file = writer.current_path().map(|p| p.to_path_buf());
        self.send_stats();

        self.set_state(LoopState::Running);
        let result = self.acquire(&mut writer);

        self.set_state(LoopState::Stopping);
        let closed = writer.close();
        self.source.close();
        result.and(closed)
    }

    /// The steady-state loop
    fn acquire(&mut self, writer: &mut RotatingWriter) -> Result<()> {
        let timeout = self.acquisition.receive_timeout();

        while self.latch.is_running() {
            if !self.pass_gate() {
                break;
            }

            if let Some(frame) = self.source.receive(timeout)? {
                self.stats.frames_received += 1;

                // A pause requested while waiting for the frame holds it here
                if !self.pass_gate() {
                    break;
                }
                self.process(frame, writer)?;
            }

            if let Some(path) = writer.maybe_rotate(self.clock.now())? {
                self.stats.rotations += 1;
                self.stats.current_file = Some(path.clone());
                self.notify(BackendMessage::Rotated(path));
            }

            if self.last_stats_time.elapsed() >= STATS_INTERVAL {
                self.send_stats();
            }
        }
        Ok(())
    }

    /// Wait in the pause gate. False when a stop arrived while paused.
    fn pass_gate(&mut self) -> bool {
        if !self.gate.is_paused() {
            return true;
        }
        self.set_state(LoopState::Paused);
        self.send_stats();
        let runnable = self.gate.await_runnable(&self.latch);
        if runnable {
            self.set_state(LoopState::Running);
        }
        runnable
    }

    /// Decode one frame and persist the result
    fn process(&mut self, frame: RawFrame, writer: &mut RotatingWriter) -> Result<()> {
        match self.decoder.decode(&frame, self.clock.wall()) {
            Ok(record) => {
                writer.write(&record)?;
                self.stats.records_written += 1;
                self.send(BackendMessage::Record(record));
            }
            Err(e) if e.is_recoverable() => {
                match e.root() {
                    CanLogError::UnknownIdentifier { .. } => self.stats.unknown_identifiers += 1,
                    _ => self.stats.malformed_payloads += 1,
                }
                tracing::debug!("Skipping frame: {}", e);
                self.send(BackendMessage::DecodeError {
                    id: frame.id,
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            tracing::info!("Acquisition state: {} -> {}", self.state, state);
            self.state = state;
        }
        self.notify(BackendMessage::State(state));
    }

    fn send_stats(&mut self) {
        self.last_stats_time = Instant::now();
        self.send(BackendMessage::Stats(self.stats.clone()));
    }

    /// Send data to the display; past `display_capacity` queued messages it
    /// only costs a counter
    fn send(&mut self, msg: BackendMessage) {
        if self.message_tx.len() >= self.display_capacity {
            self.stats.dropped_messages += 1;
            if self.stats.dropped_messages % 1000 == 1 {
                tracing::warn!(
                    "Display channel full, {} messages dropped so far",
                    self.stats.dropped_messages
                );
            }
            return;
        }
        let _ = self.message_tx.send(msg);
    }

    /// Lifecycle messages are never dropped, whatever the display backlog
    fn notify(&self, msg: BackendMessage) {
        if self.message_tx.send(msg).is_err() {
            tracing::debug!("Display receiver gone");
        }
    }
}
