use core::{fmt::Debug, time::Duration};

/// Lifecycle state of a [Timer].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerState {
    /// Never started or reset. No elapsed time.
    Idle,
    /// Accumulating elapsed time since the contained clock reading in milliseconds.
    Running { started_at: i64 },
    /// Not accumulating, but keeping the elapsed time counted so far.
    Stopped,
}

impl TimerState {
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }
}

/// Lifecycle operation, used for error reporting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    Start,
    Stop,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum TimerError {
    #[error("timeout must not be negative, got {0} ms")]
    NegativeTimeout(i64),
    #[error("timeout does not fit into signed 64 bit milliseconds")]
    TimeoutOverflow,
    #[error("operation {operation:?} not allowed in state {state:?}")]
    InvalidState {
        operation: Operation,
        state: TimerState,
    },
}

/// Generic abstraction for a timer with a start/stop/reset lifecycle.
///
/// Elapsed time only accumulates while the timer is running. Stopping freezes the elapsed
/// time and a subsequent start resumes the accumulation. Resetting discards all elapsed time.
///
/// The lifecycle policy is strict:
///
/// * Starting a running timer returns [TimerError::InvalidState] and leaves it untouched.
/// * Stopping a timer which is not running returns [TimerError::InvalidState].
/// * Resetting is always possible.
///
/// All methods take `&self` so that a timer can be shared. Implementations which can be
/// shared between threads must perform every operation atomically.
pub trait Timer: Debug {
    fn start(&self) -> Result<(), TimerError>;
    fn stop(&self) -> Result<(), TimerError>;
    fn reset(&self);
    fn is_running(&self) -> bool;

    /// Elapsed running time in milliseconds. Never negative.
    fn elapsed_millis(&self) -> i64;

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_millis().max(0) as u64)
    }
}

/// A [Timer] with a fixed timeout which can be polled for expiry.
pub trait CountdownTimer: Timer {
    /// True once the elapsed time reached the timeout. Stays true until [Timer::reset].
    fn has_expired(&self) -> bool;

    /// Remaining milliseconds until expiry, zero once expired.
    fn remaining_millis(&self) -> i64;

    /// Timeout configured at construction.
    fn timeout_millis(&self) -> i64;

    fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_millis().max(0) as u64)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis().max(0) as u64)
    }
}

/// Converts a [Duration] timeout into signed milliseconds.
pub fn duration_to_millis(duration: Duration) -> Result<i64, TimerError> {
    i64::try_from(duration.as_millis()).map_err(|_| TimerError::TimeoutOverflow)
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::*;

    #[test]
    fn test_state_running() {
        assert!(!TimerState::Idle.is_running());
        assert!(TimerState::Running { started_at: 5 }.is_running());
        assert!(!TimerState::Stopped.is_running());
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(duration_to_millis(Duration::from_millis(1500)).unwrap(), 1500);
        assert_eq!(duration_to_millis(Duration::ZERO).unwrap(), 0);
        assert_eq!(
            duration_to_millis(Duration::MAX),
            Err(TimerError::TimeoutOverflow)
        );
    }

    #[test]
    fn test_error_display() {
        let error = TimerError::InvalidState {
            operation: Operation::Start,
            state: TimerState::Running { started_at: 10 },
        };
        assert_eq!(
            error.to_string(),
            "operation Start not allowed in state Running { started_at: 10 }"
        );
        assert_eq!(
            TimerError::NegativeTimeout(-3).to_string(),
            "timeout must not be negative, got -3 ms"
        );
    }
}
