//! Cross-thread control of the acquisition loop
//!
//! The operator thread never touches the log file or the frame source. It
//! can only express intent, which reaches the loop through three points:
//!
//! - [`PauseGate`] - Mutex and condition variable, broadcast wake on resume
//! - [`RunLatch`] - One-way running flag, cleared once on stop
//! - [`destination_channel`] - One-shot handoff of the output directory
//!
//! Intents travel over a channel ([`ControlSurface`]) to a dispatcher thread
//! ([`spawn_dispatcher`]) which applies them to the gate and the latch.

use crate::error::{CanLogError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// How often blocked control waits re-check the run latch
const CONTROL_POLL: Duration = Duration::from_millis(100);

/// Capacity of the intent channel
const INTENT_CAPACITY: usize = 64;

// ==================== Run Latch ====================

/// Process-wide running flag
///
/// Starts set. Once cleared it never becomes set again.
#[derive(Debug, Clone)]
pub struct RunLatch {
    running: Arc<AtomicBool>,
}

impl Default for RunLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLatch {
    /// Create a latch in the running state
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// True until [`RunLatch::stop`] has been called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the flag. Returns true for the call that actually cleared it.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}

// ==================== Pause Gate ====================

/// Two-state gate the acquisition loop passes before each record
///
/// Running is the initial state.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: Mutex<bool>,
    changed: Condvar,
}

impl PauseGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate. Never blocks for longer than the lock.
    pub fn pause(&self) {
        let mut paused = self.lock();
        if !*paused {
            *paused = true;
            tracing::info!("Acquisition paused");
        }
    }

    /// Open the gate and wake every waiter
    pub fn resume(&self) {
        let mut paused = self.lock();
        if *paused {
            *paused = false;
            tracing::info!("Acquisition resumed");
        }
        self.changed.notify_all();
    }

    /// Current state
    pub fn is_paused(&self) -> bool {
        *self.lock()
    }

    /// Block while the gate is closed
    ///
    /// Returns true straight away when the gate is open. After having
    /// blocked, returns whether `latch` is still running, so a stop that
    /// arrives during a pause is seen on wake.
    pub fn await_runnable(&self, latch: &RunLatch) -> bool {
        let mut paused = self.lock();
        if !*paused {
            return true;
        }
        while *paused {
            if !latch.is_running() {
                return false;
            }
            paused = self
                .changed
                .wait(paused)
                .unwrap_or_else(|e| e.into_inner());
        }
        latch.is_running()
    }

    /// Wake every waiter without changing state, used after the latch is cleared
    pub fn wake_all(&self) {
        let _guard = self.lock();
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clear the latch and release anything blocked in the gate
pub fn request_stop(gate: &PauseGate, latch: &RunLatch) {
    if latch.stop() {
        tracing::info!("Stop requested");
    }
    // The latch is cleared before the lock is taken, so a waiter either
    // sees it before waiting or is woken here
    gate.wake_all();
}

// ==================== Intents ====================

/// What the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    Pause,
    Resume,
    /// Stop after confirmation
    Stop,
}

/// Operator-side sender of intents
///
/// Dropping every clone counts as a stop.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    sender: Sender<ControlIntent>,
}

impl ControlSurface {
    /// Create a surface and the receiving end for a dispatcher
    pub fn new() -> (Self, Receiver<ControlIntent>) {
        let (tx, rx) = bounded(INTENT_CAPACITY);
        (Self { sender: tx }, rx)
    }

    /// Send an intent. Returns false once the dispatcher is gone.
    pub fn send(&self, intent: ControlIntent) -> bool {
        self.sender.send(intent).is_ok()
    }

    /// Request a pause
    pub fn pause(&self) -> bool {
        self.send(ControlIntent::Pause)
    }

    /// Request a resume
    pub fn resume(&self) -> bool {
        self.send(ControlIntent::Resume)
    }

    /// Request a stop, already confirmed by the operator
    pub fn stop(&self) -> bool {
        self.send(ControlIntent::Stop)
    }
}

/// Apply one intent
pub fn apply_intent(intent: ControlIntent, gate: &PauseGate, latch: &RunLatch) {
    tracing::debug!("Control intent {:?}", intent);
    match intent {
        ControlIntent::Pause => gate.pause(),
        ControlIntent::Resume => gate.resume(),
        ControlIntent::Stop => request_stop(gate, latch),
    }
}

/// Apply intents until stop, until the surface is dropped, or until the
/// latch is cleared by someone else
pub fn run_dispatcher(intents: Receiver<ControlIntent>, gate: Arc<PauseGate>, latch: RunLatch) {
    while latch.is_running() {
        match intents.recv_timeout(CONTROL_POLL) {
            Ok(intent) => apply_intent(intent, &gate, &latch),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("Control surface dropped");
                request_stop(&gate, &latch);
            }
        }
    }
    tracing::debug!("Control dispatcher stopped");
}

/// Run [`run_dispatcher`] on its own thread
pub fn spawn_dispatcher(
    intents: Receiver<ControlIntent>,
    gate: Arc<PauseGate>,
    latch: RunLatch,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || run_dispatcher(intents, gate, latch))?;
    Ok(handle)
}

// ==================== Destination Handoff ====================

/// Operator-side end of the output directory handoff
#[derive(Debug)]
pub struct DestinationSender {
    sender: Sender<Option<PathBuf>>,
}

impl DestinationSender {
    /// Hand over the chosen directory
    pub fn confirm(self, dir: impl Into<PathBuf>) {
        let _ = self.sender.send(Some(dir.into()));
    }

    /// Report that no directory was chosen
    pub fn decline(self) {
        let _ = self.sender.send(None);
    }
}

/// Loop-side end of the output directory handoff
#[derive(Debug)]
pub struct DestinationReceiver {
    receiver: Receiver<Option<PathBuf>>,
}

impl DestinationReceiver {
    /// Wait for the operator's answer
    ///
    /// A declined request, a dropped sender and a stop before any answer all
    /// end in [`CanLogError::NoDestinationSelected`].
    pub fn wait(&self, latch: &RunLatch) -> Result<PathBuf> {
        while latch.is_running() {
            match self.receiver.recv_timeout(CONTROL_POLL) {
                Ok(Some(dir)) => return Ok(dir),
                Ok(None) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        Err(CanLogError::NoDestinationSelected)
    }
}

/// Create the one-shot directory handoff
pub fn destination_channel() -> (DestinationSender, DestinationReceiver) {
    let (tx, rx) = bounded(1);
    (
        DestinationSender { sender: tx },
        DestinationReceiver { receiver: rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_latch_is_one_way() {
        let latch = RunLatch::new();
        assert!(latch.is_running());
        assert!(latch.stop());
        assert!(!latch.stop());
        assert!(!latch.is_running());
        assert!(!latch.clone().is_running());
    }

    #[test]
    fn test_gate_starts_open() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        assert!(gate.await_runnable(&RunLatch::new()));
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let gate = PauseGate::new();
        gate.pause();
        gate.pause();
        assert!(gate.is_paused());
        gate.resume();
        gate.resume();
        assert!(!gate.is_paused());
    }

    #[test]
    fn test_resume_wakes_every_waiter() {
        let gate = Arc::new(PauseGate::new());
        let latch = RunLatch::new();
        let passed = Arc::new(AtomicUsize::new(0));
        gate.pause();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                let latch = latch.clone();
                let passed = passed.clone();
                std::thread::spawn(move || {
                    if gate.await_runnable(&latch) {
                        passed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(passed.load(Ordering::SeqCst), 0);

        gate.resume();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(passed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_stop_releases_paused_waiter() {
        let gate = Arc::new(PauseGate::new());
        let latch = RunLatch::new();
        gate.pause();

        let waiter = {
            let gate = gate.clone();
            let latch = latch.clone();
            std::thread::spawn(move || gate.await_runnable(&latch))
        };

        std::thread::sleep(Duration::from_millis(20));
        request_stop(&gate, &latch);
        assert!(!waiter.join().unwrap());
        assert!(gate.is_paused());
    }

    #[test]
    fn test_dispatcher_applies_intents() {
        let gate = Arc::new(PauseGate::new());
        let latch = RunLatch::new();
        let (surface, intents) = ControlSurface::new();
        let dispatcher = spawn_dispatcher(intents, gate.clone(), latch.clone()).unwrap();

        surface.pause();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !gate.is_paused() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(gate.is_paused());

        surface.resume();
        surface.stop();
        dispatcher.join().unwrap();
        assert!(!gate.is_paused());
        assert!(!latch.is_running());
    }

    #[test]
    fn test_dropped_surface_counts_as_stop() {
        let gate = Arc::new(PauseGate::new());
        let latch = RunLatch::new();
        let (surface, intents) = ControlSurface::new();
        let dispatcher = spawn_dispatcher(intents, gate, latch.clone()).unwrap();

        drop(surface);
        dispatcher.join().unwrap();
        assert!(!latch.is_running());
    }

    #[test]
    fn test_destination_confirmed() {
        let (tx, rx) = destination_channel();
        tx.confirm("/data/can");
        assert_eq!(rx.wait(&RunLatch::new()).unwrap(), PathBuf::from("/data/can"));
    }

    #[test]
    fn test_destination_declined_or_abandoned() {
        let (tx, rx) = destination_channel();
        tx.decline();
        assert!(matches!(
            rx.wait(&RunLatch::new()),
            Err(CanLogError::NoDestinationSelected)
        ));

        let (tx, rx) = destination_channel();
        drop(tx);
        assert!(matches!(
            rx.wait(&RunLatch::new()),
            Err(CanLogError::NoDestinationSelected)
        ));

        let (_tx, rx) = destination_channel();
        let latch = RunLatch::new();
        latch.stop();
        assert!(matches!(
            rx.wait(&latch),
            Err(CanLogError::NoDestinationSelected)
        ));
    }
}
