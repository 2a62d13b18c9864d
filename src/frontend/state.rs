//! Operator actions
//!
//! Panels return `AppAction`s instead of talking to the backend directly.
//! The app decides what each one means in the current state, which keeps
//! the stop confirmation rule in one place.

use crate::types::LoopState;

/// Actions that any panel can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    /// Pause button
    Pause,
    /// Play button
    Resume,
    /// Stop button, opens the confirmation
    RequestStop,
    /// Stop confirmed in the dialog
    ConfirmStop,
    /// Stop cancelled in the dialog
    CancelStop,
    /// Close the window once the loop is gone
    Exit,
}

/// Which controls make sense in a given loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAvailability {
    pub pause: bool,
    pub resume: bool,
    pub stop: bool,
}

impl ControlAvailability {
    pub fn for_state(state: LoopState, shutdown: bool) -> Self {
        if shutdown {
            return Self {
                pause: false,
                resume: false,
                stop: false,
            };
        }
        match state {
            LoopState::Running => Self {
                pause: true,
                resume: false,
                stop: true,
            },
            LoopState::Paused => Self {
                pause: false,
                resume: true,
                stop: true,
            },
            LoopState::Starting => Self {
                pause: false,
                resume: false,
                stop: true,
            },
            LoopState::Stopping | LoopState::Stopped => Self {
                pause: false,
                resume: false,
                stop: false,
            },
        }
    }
}
