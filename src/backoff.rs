//! # Exponential Backoff Module
//!
//! The [ExponentialBackoff] repeatedly runs a query until it reports success or until the
//! countdown bound to the configured timeout expires. Between two attempts, it waits for a
//! random number of slot times, where the upper bound of the random number grows with each
//! unsuccessful attempt until it reaches the configured cap factor.
//!
//! Waiting is delegated to a [Signal]. The [SleepSignal] simply sleeps the current thread, but
//! other signals may wake up early, for example when a resource the query is waiting on was
//! released. A signalled wake-up restarts the backoff sequence with short waits.
//!
//! The countdown is created by a [TimerCreator], so the expiry of the backoff can be driven
//! with a simulated clock in tests.
use core::time::Duration;
use std::thread;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    time::{CountdownTimer, Timer, TimerError},
    TimerCreator,
};

/// Configuration of an [ExponentialBackoff].
///
/// ## Fields
///
/// * `timeout` - Time after which the backoff gives up and returns the last unsuccessful
///   result.
/// * `slot_time` - Unit of the waiting period between two attempts. Defaults to 25 ms.
/// * `cap_factor` - Maximum number of slot times waited between two attempts, exclusive.
///   Defaults to 100.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_new::new)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackoffConfig {
    pub timeout: Duration,
    pub slot_time: Duration,
    pub cap_factor: u32,
}

impl BackoffConfig {
    pub const DEFAULT_SLOT_TIME: Duration = Duration::from_millis(25);
    pub const DEFAULT_CAP_FACTOR: u32 = 100;

    pub fn new_with_default_values(timeout: Duration) -> Self {
        Self::new(timeout, Self::DEFAULT_SLOT_TIME, Self::DEFAULT_CAP_FACTOR)
    }
}

/// Wait primitive used between two attempts.
pub trait Signal {
    /// Waits for at most `period`. Returns true if the wait ended because the signal fired.
    fn wait(&mut self, period: Duration) -> bool;
}

impl<S: Signal + ?Sized> Signal for &mut S {
    fn wait(&mut self, period: Duration) -> bool {
        (**self).wait(period)
    }
}

/// Sleeps the current thread for the full period. Never signalled.
#[derive(Debug, Default, Copy, Clone)]
pub struct SleepSignal;

impl Signal for SleepSignal {
    fn wait(&mut self, period: Duration) -> bool {
        thread::sleep(period);
        false
    }
}

/// Result of a single query attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The query was successful and must not be repeated.
    Done(T),
    /// The query was not successful and should be repeated.
    Retry(T),
}

impl<T> Attempt<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Attempt::Done(_))
    }

    pub fn into_value(self) -> T {
        match self {
            Attempt::Done(value) | Attempt::Retry(value) => value,
        }
    }
}

#[derive(Debug)]
pub struct ExponentialBackoff<Creator: TimerCreator, S: Signal = SleepSignal, R: Rng = StdRng> {
    config: BackoffConfig,
    timer_creator: Creator,
    timer: Creator::Countdown,
    signal: S,
    rng: R,
}

impl<Creator: TimerCreator> ExponentialBackoff<Creator> {
    /// Creates a backoff which sleeps between attempts. The countdown is started immediately.
    pub fn new(config: BackoffConfig, timer_creator: Creator) -> Result<Self, TimerError> {
        Self::with_signal(config, timer_creator, SleepSignal)
    }
}

impl<Creator: TimerCreator, S: Signal> ExponentialBackoff<Creator, S> {
    pub fn with_signal(
        config: BackoffConfig,
        timer_creator: Creator,
        signal: S,
    ) -> Result<Self, TimerError> {
        Self::with_rng(config, timer_creator, signal, StdRng::from_entropy())
    }
}

impl<Creator: TimerCreator, S: Signal, R: Rng> ExponentialBackoff<Creator, S, R> {
    /// Creates a backoff with an explicit random source, which allows reproducible waiting
    /// periods.
    pub fn with_rng(
        config: BackoffConfig,
        timer_creator: Creator,
        signal: S,
        rng: R,
    ) -> Result<Self, TimerError> {
        let timer = timer_creator.create_countdown(config.timeout)?;
        Ok(Self {
            config,
            timer_creator,
            timer,
            signal,
            rng,
        })
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn timer(&self) -> &Creator::Countdown {
        &self.timer
    }

    pub fn signal(&self) -> &S {
        &self.signal
    }

    pub fn signal_mut(&mut self) -> &mut S {
        &mut self.signal
    }

    /// Replaces the countdown with a freshly started one for the configured timeout.
    pub fn restart_timer(&mut self) -> Result<(), TimerError> {
        self.timer = self.timer_creator.create_countdown(self.config.timeout)?;
        Ok(())
    }

    /// Retries the query until it returns [Attempt::Done] or the countdown expired.
    ///
    /// Returns the value of the last attempt, which is the value of an unsuccessful attempt
    /// if the countdown expired. Errors returned by the query abort the retry loop and are
    /// passed to the caller.
    pub fn retry_until<T, E>(
        &mut self,
        mut query: impl FnMut() -> Result<Attempt<T>, E>,
    ) -> Result<T, E> {
        let mut iteration: u32 = 0;
        loop {
            let value = match query()? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(value) => value,
            };
            if self.timer.has_expired() {
                log::debug!(
                    "giving up after {:?}, timeout expired",
                    self.timer.elapsed()
                );
                return Ok(value);
            }
            iteration = iteration.saturating_add(1);
            let period = self.backoff_period(iteration);
            log::trace!("attempt {} unsuccessful, waiting {:?}", iteration, period);
            if self.signal.wait(period) {
                iteration = 0;
            }
        }
    }

    /// Random multiple of the slot time in `[0, min(iteration, cap_factor))` slots.
    pub fn backoff_period(&mut self, iteration: u32) -> Duration {
        let bound = iteration.min(self.config.cap_factor);
        if bound == 0 {
            return Duration::ZERO;
        }
        let slots = self.rng.gen_range(0..bound);
        self.config.slot_time.saturating_mul(slots)
    }
}
