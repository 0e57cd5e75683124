//! Environment abstraction for deterministic testing.
//!
//! Decouples drivers from the system clock. State machines never hold an
//! `Environment`; they take `now` as a parameter. Drivers use the environment
//! to read the time and to sleep between ticks, which lets simulations run on
//! a virtual clock while production uses real time.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Instant types usable by the state machines.
///
/// Implemented for anything that behaves like `std::time::Instant`.
pub trait Moment:
    Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = Self> + 'static
{
}

impl<T> Moment for T where
    T: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = T> + 'static
{
}

/// Abstract environment providing time and sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, simulations use a
    /// virtual instant.
    type Instant: Moment;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code calls this, never state machine logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
