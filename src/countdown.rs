//! # Countdown Module
//!
//! All countdown timers of this crate share the clock-agnostic [CountdownState] state machine
//! and only differ in how they protect it:
//!
//! * [Countdown]: Guards the state with a [std::sync::Mutex], so one instance can be shared
//!   between threads. Requires the `std` feature.
//! * [LocalCountdown]: Uses a [core::cell::RefCell]. Not [Sync], but usable on `no_std`
//!   systems.
//!
//! Elapsed time is computed lazily whenever the timer is queried. A clock which moves
//! backwards never produces a negative running segment, and the elapsed time reported during
//! one run never decreases. As a consequence, a countdown which reported expiry keeps doing so
//! until it is reset.
use core::cell::RefCell;

use crate::{
    clock::Clock,
    time::{CountdownTimer, Operation, Timer, TimerError, TimerState},
};

#[cfg(feature = "std")]
pub use std_mod::*;

/// Clock agnostic countdown state. All time inputs are clock readings in milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountdownState {
    timeout_millis: i64,
    state: TimerState,
    /// Elapsed time counted before the most recent start.
    accumulated_millis: i64,
    /// Highest elapsed time reported in the current run.
    peak_millis: i64,
}

impl CountdownState {
    pub fn new(timeout_millis: i64) -> Result<Self, TimerError> {
        if timeout_millis < 0 {
            return Err(TimerError::NegativeTimeout(timeout_millis));
        }
        Ok(Self {
            timeout_millis,
            state: TimerState::Idle,
            accumulated_millis: 0,
            peak_millis: 0,
        })
    }

    pub fn timeout_millis(&self) -> i64 {
        self.timeout_millis
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn start(&mut self, now: i64) -> Result<(), TimerError> {
        if self.state.is_running() {
            return Err(TimerError::InvalidState {
                operation: Operation::Start,
                state: self.state,
            });
        }
        self.state = TimerState::Running { started_at: now };
        log::trace!(
            "countdown started at {} ms, {} ms remaining",
            now,
            self.timeout_millis.saturating_sub(self.accumulated_millis)
        );
        Ok(())
    }

    pub fn stop(&mut self, now: i64) -> Result<(), TimerError> {
        if !self.state.is_running() {
            return Err(TimerError::InvalidState {
                operation: Operation::Stop,
                state: self.state,
            });
        }
        self.accumulated_millis = self.elapsed_millis(now);
        self.state = TimerState::Stopped;
        log::trace!(
            "countdown stopped after {} ms",
            self.accumulated_millis
        );
        Ok(())
    }

    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.accumulated_millis = 0;
        self.peak_millis = 0;
    }

    /// Elapsed time at the clock reading `now`. Updates the per-run high water mark.
    pub fn elapsed_millis(&mut self, now: i64) -> i64 {
        let elapsed = match self.state {
            TimerState::Running { started_at } => {
                let segment = now.saturating_sub(started_at);
                if segment < 0 {
                    log::warn!(
                        "clock regression detected: {} ms is earlier than start reference {} ms",
                        now,
                        started_at
                    );
                }
                self.accumulated_millis.saturating_add(segment.max(0))
            }
            TimerState::Idle | TimerState::Stopped => self.accumulated_millis,
        };
        self.peak_millis = self.peak_millis.max(elapsed);
        self.peak_millis
    }

    pub fn remaining_millis(&mut self, now: i64) -> i64 {
        self.timeout_millis
            .saturating_sub(self.elapsed_millis(now))
            .max(0)
    }

    pub fn has_expired(&mut self, now: i64) -> bool {
        self.elapsed_millis(now) >= self.timeout_millis
    }
}

/// Single threaded countdown timer.
#[derive(Debug)]
pub struct LocalCountdown<C: Clock> {
    clock: C,
    timeout_millis: i64,
    state: RefCell<CountdownState>,
}

impl<C: Clock> LocalCountdown<C> {
    /// Creates an idle countdown. Returns [TimerError::NegativeTimeout] for negative timeouts.
    pub fn new(clock: C, timeout_millis: i64) -> Result<Self, TimerError> {
        let state = CountdownState::new(timeout_millis)?;
        Ok(Self {
            clock,
            timeout_millis,
            state: RefCell::new(state),
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> TimerState {
        self.state.borrow().state()
    }
}

impl<C: Clock> Timer for LocalCountdown<C> {
    fn start(&self) -> Result<(), TimerError> {
        let now = self.clock.current_time_millis();
        self.state.borrow_mut().start(now)
    }

    fn stop(&self) -> Result<(), TimerError> {
        let now = self.clock.current_time_millis();
        self.state.borrow_mut().stop(now)
    }

    fn reset(&self) {
        self.state.borrow_mut().reset();
    }

    fn is_running(&self) -> bool {
        self.state.borrow().state().is_running()
    }

    fn elapsed_millis(&self) -> i64 {
        let now = self.clock.current_time_millis();
        self.state.borrow_mut().elapsed_millis(now)
    }
}

impl<C: Clock> CountdownTimer for LocalCountdown<C> {
    fn has_expired(&self) -> bool {
        let now = self.clock.current_time_millis();
        self.state.borrow_mut().has_expired(now)
    }

    fn remaining_millis(&self) -> i64 {
        let now = self.clock.current_time_millis();
        self.state.borrow_mut().remaining_millis(now)
    }

    fn timeout_millis(&self) -> i64 {
        self.timeout_millis
    }
}

#[cfg(feature = "std")]
pub mod std_mod {
    use core::time::Duration;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use crate::time::duration_to_millis;

    use super::*;

    /// Countdown timer which can be shared between threads.
    ///
    /// Every operation reads the clock and updates the state while holding one lock, so
    /// concurrent callers always observe a consistent start reference and accumulated time.
    #[derive(Debug)]
    pub struct Countdown<C: Clock> {
        clock: C,
        // Immutable copy of the state's timeout, readable without locking.
        timeout_millis: i64,
        state: Mutex<CountdownState>,
    }

    impl<C: Clock> Countdown<C> {
        /// Creates an idle countdown. Returns [TimerError::NegativeTimeout] for negative
        /// timeouts.
        pub fn new(clock: C, timeout_millis: i64) -> Result<Self, TimerError> {
            let state = CountdownState::new(timeout_millis)?;
            Ok(Self {
                clock,
                timeout_millis,
                state: Mutex::new(state),
            })
        }

        pub fn with_timeout(clock: C, timeout: Duration) -> Result<Self, TimerError> {
            Self::new(clock, duration_to_millis(timeout)?)
        }

        /// Creates a countdown and starts it immediately.
        pub fn new_started(clock: C, timeout: Duration) -> Result<Self, TimerError> {
            let countdown = Self::with_timeout(clock, timeout)?;
            countdown.start()?;
            Ok(countdown)
        }

        pub fn clock(&self) -> &C {
            &self.clock
        }

        pub fn state(&self) -> TimerState {
            self.lock().state()
        }

        // The state is only mutated by infallible code, so a poisoned lock still holds a
        // consistent state.
        fn lock(&self) -> MutexGuard<'_, CountdownState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn with_now<T>(&self, f: impl FnOnce(&mut CountdownState, i64) -> T) -> T {
            let mut state = self.lock();
            let now = self.clock.current_time_millis();
            f(&mut state, now)
        }
    }

    impl<C: Clock> Timer for Countdown<C> {
        fn start(&self) -> Result<(), TimerError> {
            self.with_now(|state, now| state.start(now))
        }

        fn stop(&self) -> Result<(), TimerError> {
            self.with_now(|state, now| state.stop(now))
        }

        fn reset(&self) {
            self.lock().reset();
        }

        fn is_running(&self) -> bool {
            self.lock().state().is_running()
        }

        fn elapsed_millis(&self) -> i64 {
            self.with_now(|state, now| state.elapsed_millis(now))
        }
    }

    impl<C: Clock> CountdownTimer for Countdown<C> {
        fn has_expired(&self) -> bool {
            self.with_now(|state, now| state.has_expired(now))
        }

        fn remaining_millis(&self) -> i64 {
            self.with_now(|state, now| state.remaining_millis(now))
        }

        fn timeout_millis(&self) -> i64 {
            self.timeout_millis
        }
    }
}
