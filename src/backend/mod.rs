//! Backend module for CAN acquisition
//!
//! This module runs the acquisition loop in a separate thread to keep the
//! UI responsive. It uses crossbeam channels for thread-safe communication
//! with the frontend.
//!
//! # Architecture
//!
//! - [`BackendMessage`] - Messages sent from the loop to the UI (records, state, errors)
//! - [`FrontendReceiver`] - UI-side handle: drains messages, sends control intents,
//!   answers the output directory request
//! - [`AcquisitionBackend`] - Entry point that wires the loop and spawns its threads
//!
//! # Components
//!
//! - [`FrameSource`] / [`BufferedSource`] - Buffered frame delivery from a [`BusReader`]
//! - [`VirtualBus`] - Generated traffic for running without hardware
//! - `SocketCanBus` - Linux SocketCAN reader (feature `socketcan`)
//! - [`PauseGate`] / [`RunLatch`] - Control points shared with the operator thread
//! - [`AcquisitionWorker`] - The acquisition loop itself
//!
//! # Example
//!
//! ```ignore
//! use canlog_rs::backend::{open_source, AcquisitionBackend};
//!
//! let source = open_source(&config, &schema)?;
//! let (backend, mut frontend) = AcquisitionBackend::new(&config, schema, source);
//! let running = backend.spawn()?;
//!
//! frontend.confirm_destination("/data/can");
//! frontend.pause();
//! frontend.resume();
//! frontend.stop();
//!
//! let stats = running.join()?;
//! ```

pub mod control;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan_bus;
pub mod source;
pub mod virtual_bus;
pub mod worker;

pub use control::{
    apply_intent, destination_channel, request_stop, spawn_dispatcher, ControlIntent,
    ControlSurface, DestinationReceiver, DestinationSender, PauseGate, RunLatch,
};
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan_bus::SocketCanBus;
pub use source::{BufferedSource, BusReader, ChannelReader, FrameSource};
pub use virtual_bus::{SignalPattern, VirtualBus};
pub use worker::AcquisitionWorker;

use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, BusKind};
use crate::error::{CanLogError, Result};
use crate::schema::{Schema, SchemaDecoder};
use crate::session::{FsOpener, LogOpener};
use crate::types::{AcquisitionStats, DecodedRecord, LoopState};
use crossbeam_channel::{unbounded, Receiver};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Display backlog above which records, decode errors and statistics are
/// dropped
///
/// Enough for ~10 seconds at 1000 frames per second. State changes,
/// rotations, fatal errors and shutdown are queued regardless.
pub const DISPLAY_CHANNEL_CAPACITY: usize = 10_000;

/// Message sent from the acquisition loop to the UI
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// A record was written
    Record(DecodedRecord),
    /// A frame was skipped
    DecodeError { id: u32, error: String },
    /// Loop state changed
    State(LoopState),
    /// Logging moved to a new file
    Rotated(PathBuf),
    /// Statistics update
    Stats(AcquisitionStats),
    /// The run ended with an error
    Fatal(String),
    /// The loop has exited
    Shutdown,
}

/// Open the configured bus as a buffered frame source
pub fn open_source(config: &AppConfig, schema: &Schema) -> Result<Box<dyn FrameSource>> {
    let reader: Box<dyn BusReader> = match config.bus.kind {
        BusKind::Virtual => Box::new(
            VirtualBus::new(schema, Duration::from_millis(config.virtual_bus.interval_ms))
                .with_frame_limit(config.virtual_bus.frame_limit),
        ),
        BusKind::Socketcan => open_socketcan(&config.bus.channel)?,
    };
    let source = BufferedSource::spawn(reader, config.bus.queue_capacity)?;
    Ok(Box::new(source))
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_socketcan(channel: &str) -> Result<Box<dyn BusReader>> {
    Ok(Box::new(SocketCanBus::open(channel)?))
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_socketcan(channel: &str) -> Result<Box<dyn BusReader>> {
    Err(CanLogError::Config(format!(
        "Cannot open '{}': built without SocketCAN support (enable the `socketcan` feature on Linux)",
        channel
    )))
}

/// Frontend receiver for backend messages
pub struct FrontendReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
    control: ControlSurface,
    destination: Option<DestinationSender>,
    latch: RunLatch,
}

impl FrontendReceiver {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Hand the output directory to the loop. Only the first answer counts.
    pub fn confirm_destination(&mut self, dir: impl Into<PathBuf>) {
        if let Some(sender) = self.destination.take() {
            sender.confirm(dir);
        }
    }

    /// Tell the loop no directory was chosen
    pub fn decline_destination(&mut self) {
        if let Some(sender) = self.destination.take() {
            sender.decline();
        }
    }

    /// True until the directory request has been answered
    pub fn awaiting_destination(&self) -> bool {
        self.destination.is_some()
    }

    /// Request a pause
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Request a resume
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Request a confirmed stop
    pub fn stop(&self) {
        self.control.stop();
    }

    /// The intent sender, for callers that want their own handle
    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    /// False once a stop has been applied or the loop has ended
    pub fn is_running(&self) -> bool {
        self.latch.is_running()
    }
}

/// The acquisition backend before its threads are started
pub struct AcquisitionBackend {
    worker: AcquisitionWorker,
    intents: Receiver<ControlIntent>,
}

impl AcquisitionBackend {
    /// Wire a backend reading from `source` and writing real files
    pub fn new(
        config: &AppConfig,
        schema: Arc<Schema>,
        source: Box<dyn FrameSource>,
    ) -> (Self, FrontendReceiver) {
        let (msg_tx, msg_rx) = unbounded();
        let (control, intents) = ControlSurface::new();
        let (destination_tx, destination_rx) = destination_channel();
        let latch = RunLatch::new();
        let gate = Arc::new(PauseGate::new());

        let worker = AcquisitionWorker {
            source,
            decoder: SchemaDecoder::new(schema),
            opener: Some(Box::new(FsOpener)),
            clock: Arc::new(SystemClock),
            logging: config.logging.clone(),
            acquisition: config.acquisition.clone(),
            gate,
            latch: latch.clone(),
            destination: destination_rx,
            message_tx: msg_tx,
            display_capacity: DISPLAY_CHANNEL_CAPACITY,
            state: LoopState::Starting,
            stats: AcquisitionStats::default(),
            last_stats_time: Instant::now(),
        };

        let frontend = FrontendReceiver {
            receiver: msg_rx,
            control,
            destination: Some(destination_tx),
            latch,
        };

        (Self { worker, intents }, frontend)
    }

    /// Write through a different file opener
    pub fn with_opener(mut self, opener: Box<dyn LogOpener>) -> Self {
        self.worker.opener = Some(opener);
        self
    }

    /// Drop display data past a different backlog
    pub fn with_display_capacity(mut self, capacity: usize) -> Self {
        self.worker.display_capacity = capacity;
        self
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.worker.clock = clock;
        self
    }

    /// Shared pause gate
    pub fn gate(&self) -> Arc<PauseGate> {
        self.worker.gate.clone()
    }

    /// Shared run latch
    pub fn stop_handle(&self) -> RunLatch {
        self.worker.latch.clone()
    }

    /// Start the control dispatcher and the acquisition thread
    pub fn spawn(self) -> Result<RunningBackend> {
        let dispatcher = spawn_dispatcher(
            self.intents,
            self.worker.gate.clone(),
            self.worker.latch.clone(),
        )?;
        let worker = self.worker;
        let acquisition = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || worker.run())?;

        Ok(RunningBackend {
            acquisition,
            dispatcher,
        })
    }
}

/// Threads of a started backend
pub struct RunningBackend {
    acquisition: JoinHandle<Result<AcquisitionStats>>,
    dispatcher: JoinHandle<()>,
}

impl RunningBackend {
    /// True once the acquisition loop has exited
    pub fn is_finished(&self) -> bool {
        self.acquisition.is_finished()
    }

    /// Wait for both threads and return the loop's outcome
    pub fn join(self) -> Result<AcquisitionStats> {
        let outcome = self
            .acquisition
            .join()
            .map_err(|_| CanLogError::Channel("acquisition thread panicked".to_string()))?;
        if self.dispatcher.join().is_err() {
            tracing::error!("Control dispatcher panicked");
        }
        outcome
    }
}
