//! Delay and sound counters, decremented at 60Hz by the caller's clock.
//!
//! Two interchangeable implementations share one interface: [`racy::Timer`]
//! for machines driven from a single task, and [`atomic::Timer`] (feature
//! `atomic`) for callers that fire `tick_timers` from an interrupt or a
//! second thread without taking a lock around the whole machine.

/// Result of a single 60Hz decrement.
///
/// `Finished` marks the 1 -> 0 transition, which is the edge the sound
/// collaborator is notified on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerState {
    On,
    Off,
    Finished,
}

pub mod racy {
    use super::TimerState;

    /// A plain 8-bit counter.
    #[derive(Debug)]
    pub struct Timer(u8);

    impl Timer {
        pub fn new() -> Self {
            Self(0)
        }

        #[inline]
        pub fn store(&mut self, value: u8) {
            self.0 = value;
        }

        #[inline]
        pub fn load(&self) -> u8 {
            self.0
        }

        /// Subtract one if nonzero, never dropping below zero.
        #[inline]
        pub fn decrement(&mut self) -> TimerState {
            if self.0 > 0 {
                self.0 -= 1;
                if self.0 == 0 {
                    TimerState::Finished
                } else {
                    TimerState::On
                }
            } else {
                TimerState::Off
            }
        }
    }
}

#[cfg(feature = "atomic")]
pub mod atomic {
    use super::TimerState;
    use core::sync::atomic::{AtomicU8, Ordering};

    /// An 8-bit counter safe to share with an interrupt handler.
    #[derive(Debug)]
    pub struct Timer(AtomicU8);

    impl Timer {
        pub fn new() -> Self {
            Self(AtomicU8::new(0))
        }

        #[inline]
        pub fn store(&mut self, value: u8) {
            self.0.store(value, Ordering::Release);
        }

        #[inline]
        pub fn load(&self) -> u8 {
            self.0.load(Ordering::Acquire)
        }

        /// Subtract one if nonzero, never dropping below zero.
        #[inline]
        pub fn decrement(&mut self) -> TimerState {
            self.0
                .fetch_update(Ordering::Release, Ordering::Relaxed, |value| {
                    if value > 0 {
                        Some(value - 1)
                    } else {
                        Some(value)
                    }
                })
                .map(|value| match value {
                    0 => TimerState::Off,
                    1 => TimerState::Finished,
                    _ => TimerState::On,
                })
                .unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TimerState;

    macro_rules! timer_behaviour_tests {
        ($name:ident, $timer:ty) => {
            mod $name {
                use super::*;

                #[test]
                fn store_and_load() {
                    let mut timer = <$timer>::new();
                    assert_eq!(timer.load(), 0);
                    timer.store(0xFF);
                    assert_eq!(timer.load(), 0xFF);
                }

                #[test]
                fn decrement_is_strictly_monotonic_until_zero() {
                    let mut timer = <$timer>::new();
                    timer.store(3);
                    assert_eq!(timer.decrement(), TimerState::On);
                    assert_eq!(timer.load(), 2);
                    assert_eq!(timer.decrement(), TimerState::On);
                    assert_eq!(timer.load(), 1);
                    assert_eq!(timer.decrement(), TimerState::Finished);
                    assert_eq!(timer.load(), 0);
                }

                #[test]
                fn decrement_floors_at_zero() {
                    let mut timer = <$timer>::new();
                    assert_eq!(timer.decrement(), TimerState::Off);
                    assert_eq!(timer.load(), 0);
                    timer.store(1);
                    assert_eq!(timer.decrement(), TimerState::Finished);
                    assert_eq!(timer.decrement(), TimerState::Off);
                    assert_eq!(timer.load(), 0);
                }
            }
        };
    }

    timer_behaviour_tests!(racy, crate::timer::racy::Timer);
    #[cfg(feature = "atomic")]
    timer_behaviour_tests!(atomic, crate::timer::atomic::Timer);
}
