//! Virtual-time environment.
//!
//! `SimEnv` is the simulation implementation of the Environment trait. Time
//! only moves when something sleeps or a test advances it, so reconnect
//! backoff, typing debounce and typing expiry run instantly and identically
//! on every run.

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use cutroom_core::env::Environment;

/// Instant on the virtual clock: time since the simulation started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Start of the simulation.
    pub const START: Self = Self(Duration::ZERO);

    /// Time since the simulation started.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Simulation environment with a shared virtual clock.
///
/// Clones share the clock, so several simulated participants see the same
/// time.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    clock: Arc<Mutex<Duration>>,
}

impl SimEnv {
    /// Create an environment at [`SimInstant::START`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(*self.clock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Advances the clock instead of waiting, then yields so other simulated
    /// participants on the same executor get a turn.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let env = self.clone();
        async move {
            env.advance(duration);
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        other.advance(Duration::from_millis(250));

        assert_eq!(env.now() - SimInstant::START, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn sleep_advances_virtual_time() {
        let env = SimEnv::new();
        let start = env.now();

        env.sleep(Duration::from_secs(30)).await;

        assert_eq!(env.now() - start, Duration::from_secs(30));
        assert_eq!(start - env.now(), Duration::ZERO);
    }
}
