//! This crate provides countdown timers which measure time exclusively through an injected
//! [clock::Clock].
//!
//! Decoupling the timers from the wall clock of the host allows testing all time dependent
//! behaviour deterministically with a [clock::SimulatedClock] instead of sleeping. Production
//! code uses the [clock::SystemClock] which reads the host clock.
//!
//! The timer abstractions are modelled by two traits inside the [time] module:
//!
//! * [time::Timer]: start/stop/reset lifecycle which accumulates elapsed time only while
//!   running. Stopping preserves the elapsed time, resetting discards it.
//! * [time::CountdownTimer]: a [time::Timer] with a fixed timeout which can be polled for
//!   expiry and the remaining time.
//!
//! The timers are purely reactive. There are no background threads or callbacks, and the
//! elapsed time is computed from the clock whenever the timer is queried. Any component which
//! wants to act on expiry has to poll the timer, for example with the
//! [backoff::ExponentialBackoff] helper, which retries a query until it succeeds or its
//! countdown expires.
//!
//! The library is `no_std` compatible. The [countdown::LocalCountdown] and the
//! [clock::SimulatedClock] are always available. The thread safe [countdown::Countdown], the
//! [clock::SystemClock] and the backoff helper require the `std` feature, which is enabled by
//! default.
//!
//! # Example
//!
//! ```
//! use countdown::{clock::SimulatedClock, countdown::Countdown, time::CountdownTimer, time::Timer};
//!
//! let clock = SimulatedClock::new(0);
//! let countdown = Countdown::new(&clock, 1000).unwrap();
//! countdown.start().unwrap();
//! clock.set_to(400);
//! assert_eq!(countdown.remaining_millis(), 600);
//! clock.set_to(1000);
//! assert!(countdown.has_expired());
//! ```
#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

#[cfg(feature = "std")]
pub mod backoff;
pub mod clock;
pub mod countdown;
pub mod time;

use core::time::Duration;

use crate::time::{CountdownTimer, TimerError};

#[cfg(feature = "std")]
pub use std_mod::*;

/// A generic trait which allows components to create countdown timers without knowing the
/// clock they are bound to.
///
/// This allows the creation of different countdowns depending on the runtime environment, for
/// example countdowns using the system clock in production and countdowns using a simulated
/// clock in tests.
pub trait TimerCreator {
    type Countdown: CountdownTimer;

    /// Creates a countdown for the given timeout which is already running.
    fn create_countdown(&self, timeout: Duration) -> Result<Self::Countdown, TimerError>;
}

#[cfg(feature = "std")]
pub mod std_mod {
    use crate::{
        clock::{Clock, SystemClock},
        countdown::Countdown,
    };

    use super::*;

    /// Creates started [Countdown]s which share one clock handle.
    #[derive(Debug, Clone, derive_new::new)]
    pub struct ClockTimerCreator<C: Clock + Clone> {
        clock: C,
    }

    impl<C: Clock + Clone> ClockTimerCreator<C> {
        pub fn clock(&self) -> &C {
            &self.clock
        }
    }

    impl Default for ClockTimerCreator<SystemClock> {
        fn default() -> Self {
            Self::new(SystemClock)
        }
    }

    impl<C: Clock + Clone> TimerCreator for ClockTimerCreator<C> {
        type Countdown = Countdown<C>;

        fn create_countdown(&self, timeout: Duration) -> Result<Self::Countdown, TimerError> {
            Countdown::new_started(self.clock.clone(), timeout)
        }
    }
}
