//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod scripted_source;

use canlog_rs::backend::BackendMessage;
use canlog_rs::types::LoopState;
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(20)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Poll `condition` until it holds or `limit` passes
pub fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// States in the order the loop reported them
pub fn states(messages: &[BackendMessage]) -> Vec<LoopState> {
    messages
        .iter()
        .filter_map(|m| match m {
            BackendMessage::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}

/// Number of lines in a log file body
pub fn line_count(contents: Option<String>) -> usize {
    contents.map(|c| c.lines().count()).unwrap_or(0)
}
