//! Frame sources
//!
//! A [`FrameSource`] is what the acquisition loop reads from. The usual one
//! is a [`BufferedSource`]: a notifier thread pulls frames from a blocking
//! [`BusReader`] (a driver) and queues them, so frames arriving while the
//! loop is busy or paused are kept and delivered in order.

use crate::error::{CanLogError, Result};
use crate::types::RawFrame;
use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the notifier waits on the driver before re-checking for close
const NOTIFIER_POLL: Duration = Duration::from_millis(100);

/// What the acquisition loop receives frames from
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` once `timeout` has passed without one
    ///
    /// Fails with [`CanLogError::TransportDisconnected`] when the transport
    /// is gone and every frame received before that has been delivered.
    fn receive(&mut self, timeout: Duration) -> Result<Option<RawFrame>>;

    /// Stop delivery and release the transport. Idempotent.
    fn close(&mut self);
}

/// Blocking access to a bus driver
pub trait BusReader: Send {
    /// Read one frame, waiting at most `timeout`
    ///
    /// Any error is treated as a lost transport.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>>;

    /// Interface name for diagnostics
    fn name(&self) -> &str;

    /// Shut the driver down
    fn shutdown(&mut self) {}
}

enum SourceEvent {
    Frame(RawFrame),
    Disconnected(String),
}

/// FIFO-buffered source fed by a notifier thread
pub struct BufferedSource {
    name: String,
    queue: Receiver<SourceEvent>,
    running: Arc<AtomicBool>,
    notifier: Option<JoinHandle<()>>,
    disconnected: Option<String>,
}

impl BufferedSource {
    /// Start a notifier thread for `reader`
    ///
    /// `capacity` bounds the queue; 0 means unbounded. When a bounded queue
    /// is full the notifier stops reading, leaving frames in the driver.
    pub fn spawn(mut reader: Box<dyn BusReader>, capacity: usize) -> Result<Self> {
        let name = reader.name().to_string();
        let (tx, rx) = if capacity == 0 {
            unbounded()
        } else {
            bounded(capacity)
        };
        let running = Arc::new(AtomicBool::new(true));
        let notifier_running = running.clone();

        let notifier = std::thread::Builder::new()
            .name(format!("notifier-{}", name))
            .spawn(move || {
                run_notifier(reader.as_mut(), &tx, &notifier_running);
                reader.shutdown();
            })?;

        tracing::info!("Frame source '{}' started", name);
        Ok(Self {
            name,
            queue: rx,
            running,
            notifier: Some(notifier),
            disconnected: None,
        })
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames queued but not yet received
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn run_notifier(reader: &mut dyn BusReader, tx: &Sender<SourceEvent>, running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        let frame = match reader.read_frame(NOTIFIER_POLL) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Bus '{}' failed: {}", reader.name(), e);
                let _ = tx.send(SourceEvent::Disconnected(e.to_string()));
                return;
            }
        };

        let mut event = SourceEvent::Frame(frame);
        loop {
            match tx.send_timeout(event, NOTIFIER_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(back)) => {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    event = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}

impl FrameSource for BufferedSource {
    fn receive(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        if let Some(ref reason) = self.disconnected {
            return Err(CanLogError::TransportDisconnected(reason.clone()));
        }

        match self.queue.recv_timeout(timeout) {
            Ok(SourceEvent::Frame(frame)) => Ok(Some(frame)),
            Ok(SourceEvent::Disconnected(reason)) => {
                self.disconnected = Some(reason.clone());
                Err(CanLogError::TransportDisconnected(reason))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                let reason = format!("notifier for '{}' stopped", self.name);
                self.disconnected = Some(reason.clone());
                Err(CanLogError::TransportDisconnected(reason))
            }
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.notifier.take() {
            if handle.join().is_err() {
                tracing::error!("Notifier thread for '{}' panicked", self.name);
            }
            tracing::info!("Frame source '{}' closed", self.name);
        }
    }
}

impl Drop for BufferedSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bus reader fed through a channel
///
/// Frames pushed into the paired sender come out of [`BusReader::read_frame`].
/// Dropping every sender is seen as a transport disconnect.
pub struct ChannelReader {
    name: String,
    frames: Receiver<RawFrame>,
}

impl ChannelReader {
    /// Create a reader and the sender that feeds it
    pub fn new(name: impl Into<String>) -> (Sender<RawFrame>, Self) {
        let (tx, rx) = unbounded();
        (
            tx,
            Self {
                name: name.into(),
                frames: rx,
            },
        )
    }
}

impl BusReader for ChannelReader {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CanLogError::TransportDisconnected(
                format!("'{}' sender dropped", self.name),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
