//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use dendron_rs::backend::{ControlHandle, SessionMessage};
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
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

/// Receive messages until one matches `pred`, panicking after the test timeout
pub fn wait_for_message<F>(handle: &ControlHandle, mut pred: F) -> SessionMessage
where
    F: FnMut(&SessionMessage) -> bool,
{
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if let Some(msg) = handle.recv_timeout(Duration::from_millis(20)) {
            if pred(&msg) {
                return msg;
            }
        }
    }
    panic!("Timed out waiting for backend message");
}
