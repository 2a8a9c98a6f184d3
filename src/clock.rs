//! # Clock Module
//!
//! The core abstraction provided by this module is the [Clock] trait. Every timer in this crate
//! reads the time through an injected [Clock] and never through the host clock directly.
//!
//! The two concrete implementations provided are:
//!
//! * [SystemClock]: Wall clock of the host, requires the `std` feature.
//! * [SimulatedClock]: A clock which only moves when told to. Suitable for deterministic tests
//!   without any sleeping.
use core::{
    fmt::Debug,
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

#[cfg(feature = "std")]
pub use std_mod::*;

/// Source of the current time.
pub trait Clock: Debug {
    /// The current time in milliseconds since 1970-01-01T00:00:00Z (UTC).
    fn current_time_millis(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn current_time_millis(&self) -> i64 {
        (**self).current_time_millis()
    }
}

#[cfg(feature = "alloc")]
impl<C: Clock + ?Sized> Clock for alloc::sync::Arc<C> {
    fn current_time_millis(&self) -> i64 {
        (**self).current_time_millis()
    }
}

#[cfg(feature = "alloc")]
impl<C: Clock + ?Sized> Clock for alloc::boxed::Box<C> {
    fn current_time_millis(&self) -> i64 {
        (**self).current_time_millis()
    }
}

/// Manually driven clock.
///
/// The time is stored atomically, so a test driver thread may move the clock while timers are
/// queried from other threads. Share it by reference or wrap it inside an
/// [Arc](alloc::sync::Arc). Moving the clock backwards is allowed to simulate clock
/// regression.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now_millis: AtomicI64,
}

impl SimulatedClock {
    pub const fn new(start_millis: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(start_millis),
        }
    }

    pub fn set_to(&self, millis: i64) {
        self.now_millis.store(millis, Ordering::SeqCst);
    }

    /// Moves the clock by a signed amount of milliseconds and returns the new time.
    pub fn advance_millis(&self, delta: i64) -> i64 {
        let mut current = self.now_millis.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(delta);
            match self.now_millis.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn advance_by(&self, delta: Duration) -> i64 {
        self.advance_millis(i64::try_from(delta.as_millis()).unwrap_or(i64::MAX))
    }
}

impl Clock for SimulatedClock {
    fn current_time_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "std")]
pub mod std_mod {
    use super::*;

    /// Wall clock of the host, read through [chrono::Utc].
    #[derive(Debug, Default, Copy, Clone)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn current_time_millis(&self) -> i64 {
            chrono::Utc::now().timestamp_millis()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{boxed::Box, sync::Arc, thread, vec::Vec};

    use super::*;

    #[test]
    fn test_simulated_clock() {
        let clock = SimulatedClock::new(1000);
        assert_eq!(clock.current_time_millis(), 1000);
        assert_eq!(clock.advance_millis(250), 1250);
        assert_eq!(clock.advance_by(Duration::from_secs(1)), 2250);
        assert_eq!(clock.current_time_millis(), 2250);
        clock.set_to(5);
        assert_eq!(clock.current_time_millis(), 5);
    }

    #[test]
    fn test_simulated_clock_regression() {
        let clock = SimulatedClock::default();
        assert_eq!(clock.current_time_millis(), 0);
        assert_eq!(clock.advance_millis(-20), -20);
    }

    #[test]
    fn test_simulated_clock_saturates() {
        let clock = SimulatedClock::new(i64::MAX - 1);
        assert_eq!(clock.advance_millis(10), i64::MAX);
        assert_eq!(clock.advance_by(Duration::MAX), i64::MAX);
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_shared_clock_handles() {
        let clock = Arc::new(SimulatedClock::new(7));
        let by_ref: &dyn Clock = &clock;
        assert_eq!(by_ref.current_time_millis(), 7);
        let boxed: Box<dyn Clock> = Box::new(SimulatedClock::new(3));
        assert_eq!(boxed.current_time_millis(), 3);
    }

    #[test]
    fn test_concurrent_advance() {
        let clock = Arc::new(SimulatedClock::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.advance_millis(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(clock.current_time_millis(), 4000);
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_system_clock() {
        let clock = SystemClock;
        let first = clock.current_time_millis();
        // 2020-01-01T00:00:00Z
        assert!(first > 1_577_836_800_000);
        thread::sleep(Duration::from_millis(5));
        assert!(clock.current_time_millis() >= first);
    }
}
