//! A frame source that plays back a fixed script

use canlog_rs::backend::{FrameSource, RunLatch};
use canlog_rs::error::{CanLogError, Result};
use canlog_rs::types::RawFrame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// One scripted `receive` outcome
pub enum Step {
    Frame(RawFrame),
    Timeout,
    Disconnect(String),
}

type FrameHook = Box<dyn FnMut(usize, &RawFrame) + Send>;

/// Plays back `Step`s, then reports timeouts (or stops the loop)
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    delivered: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    stop_when_done: Arc<OnceLock<RunLatch>>,
    on_frame: Option<FrameHook>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            delivered: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            stop_when_done: Arc::new(OnceLock::new()),
            on_frame: None,
        }
    }

    pub fn frames(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self::new(frames.into_iter().map(Step::Frame))
    }

    /// Slot for the loop's latch; once filled, the loop is stopped when
    /// the script runs out
    pub fn stop_slot(&self) -> Arc<OnceLock<RunLatch>> {
        self.stop_when_done.clone()
    }

    /// Called with the 1-based frame number just before a frame is returned
    pub fn on_frame(mut self, hook: impl FnMut(usize, &RawFrame) + Send + 'static) -> Self {
        self.on_frame = Some(Box::new(hook));
        self
    }

    /// Frames handed to the loop so far
    pub fn delivered(&self) -> Arc<AtomicUsize> {
        self.delivered.clone()
    }

    /// Set once `close` has been called
    pub fn closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn receive(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CanLogError::TransportDisconnected("closed".to_string()));
        }
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => {
                let n = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(hook) = self.on_frame.as_mut() {
                    hook(n, &frame);
                }
                Ok(Some(frame))
            }
            Some(Step::Timeout) => Ok(None),
            Some(Step::Disconnect(reason)) => Err(CanLogError::TransportDisconnected(reason)),
            None => {
                if let Some(latch) = self.stop_when_done.get() {
                    latch.stop();
                }
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
