//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`cutroom_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Input is scripted ahead of time with [`SimDriver::schedule`]; the socket
//! is a mailbox on a shared [`crate::SimServer`]. Clones share state, so a
//! test keeps one clone to inspect what the runtime rendered after it
//! returns.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use cutroom_app::{AppEvent, ChatApp, Driver};
use cutroom_core::env::Environment;
use cutroom_proto::JobId;

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
    sim_env::{SimEnv, SimInstant},
    sim_server::{ClientId, SharedSimServer, lock},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for event injection and inspection.
#[derive(Default)]
struct SharedState {
    /// Scripted input, ordered by due time.
    scheduled: Vec<(SimInstant, AppEvent<SimInstant>)>,
    /// Transport lifecycle events, delivered before scripted input.
    lifecycle: VecDeque<AppEvent<SimInstant>>,
    transport_open: bool,
    open_attempts: usize,
    /// Every rendered view, oldest first.
    rendered: Vec<ClientSnapshot>,
    invariants: Option<Arc<InvariantRegistry>>,
    violations: Vec<Violation>,
}

/// Simulation driver for deterministic testing.
///
/// Implements [`Driver`] so the same [`cutroom_app::Runtime`] orchestration
/// code runs in both the terminal client and simulation tests.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    env: SimEnv,
    server: SharedSimServer,
    client: ClientId,
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDriver").field("client", &self.client).finish_non_exhaustive()
    }
}

impl SimDriver {
    /// Create a driver for participant `user_id` on `server`.
    pub fn new(server: SharedSimServer, env: SimEnv, user_id: &str) -> Self {
        let client = lock(&server).register(user_id);
        Self { state: Arc::default(), env, server, client }
    }

    /// Check invariants on every render.
    #[must_use]
    pub fn with_invariants(self, registry: InvariantRegistry) -> Self {
        self.state().invariants = Some(Arc::new(registry));
        self
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` once `after` has elapsed on the virtual clock.
    pub fn schedule(&self, after: Duration, event: AppEvent<SimInstant>) {
        let due = self.env.now() + after;
        let mut state = self.state();
        let pos = state.scheduled.partition_point(|(at, _)| *at <= due);
        state.scheduled.insert(pos, (due, event));
    }

    /// Server-side connection id.
    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Handshakes attempted so far.
    pub fn open_attempts(&self) -> usize {
        self.state().open_attempts
    }

    /// Render calls so far.
    pub fn renders(&self) -> usize {
        self.state().rendered.len()
    }

    /// View as of the last render.
    pub fn last_render(&self) -> Option<ClientSnapshot> {
        self.state().rendered.last().cloned()
    }

    /// Every rendered view, oldest first.
    pub fn render_history(&self) -> Vec<ClientSnapshot> {
        self.state().rendered.clone()
    }

    /// Last rendered view of `job_id`, before the room was left.
    pub fn last_render_of(&self, job_id: &JobId) -> Option<ClientSnapshot> {
        let state = self.state();
        state.rendered.iter().rev().find(|view| view.active_job.as_ref() == Some(job_id)).cloned()
    }

    /// Invariant violations observed while rendering.
    pub fn violations(&self) -> Vec<Violation> {
        self.state().violations.clone()
    }

    /// True if scripted input is still waiting.
    pub fn has_pending(&self) -> bool {
        let state = self.state();
        !state.scheduled.is_empty() || !state.lifecycle.is_empty()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent<SimInstant>>, Self::Error> {
        let now = self.env.now();
        let mut state = self.state();

        if let Some(event) = state.lifecycle.pop_front() {
            return Ok(Some(event));
        }
        match state.scheduled.first() {
            Some((due, _)) if *due <= now => Ok(Some(state.scheduled.remove(0).1)),
            _ => Ok(None),
        }
    }

    async fn open_transport(&mut self, _token: &str) -> Result<(), Self::Error> {
        let accepted = lock(&self.server).connect(self.client);
        let now = self.env.now();
        let mut state = self.state();
        state.open_attempts += 1;
        state.transport_open = accepted;

        let event = if accepted {
            AppEvent::TransportOpened
        } else {
            AppEvent::TransportFailed { now, reason: "connection refused".into() }
        };
        state.lifecycle.push_back(event);
        Ok(())
    }

    fn close_transport(&mut self) {
        self.state().transport_open = false;
        lock(&self.server).disconnect(self.client);
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), Self::Error> {
        if self.state().transport_open {
            lock(&self.server).handle_frame(self.client, &frame);
        } else {
            tracing::trace!(client = self.client, "frame dropped, transport closed");
        }
        Ok(())
    }

    async fn recv_frame(&mut self) -> Option<String> {
        let now = self.env.now();
        let mut state = self.state();
        if !state.transport_open {
            return None;
        }

        let mut server = lock(&self.server);
        if !server.is_connected(self.client) {
            state.transport_open = false;
            state
                .lifecycle
                .push_back(AppEvent::TransportFailed { now, reason: "connection reset".into() });
            return None;
        }
        server.next_frame(self.client)
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn render(&mut self, app: &ChatApp<SimInstant>) -> Result<(), Self::Error> {
        let snapshot = ClientSnapshot::from_app(app);
        let mut state = self.state();
        if let Some(registry) = state.invariants.clone()
            && let Err(violations) = registry.check_all(&SystemSnapshot::single(snapshot.clone()))
        {
            state.violations.extend(violations);
        }
        state.rendered.push(snapshot);
        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimServer, create_shared_server};

    fn driver() -> SimDriver {
        SimDriver::new(create_shared_server(SimServer::new()), SimEnv::new(), "alice")
    }

    #[tokio::test]
    async fn scheduled_events_wait_for_their_time() {
        let mut driver = driver();
        driver.schedule(Duration::from_secs(1), AppEvent::Close);
        assert!(driver.has_pending());

        assert!(driver.poll_event().await.unwrap().is_none());
        driver.env.advance(Duration::from_secs(1));
        assert!(matches!(driver.poll_event().await.unwrap(), Some(AppEvent::Close)));
        assert!(!driver.has_pending());
    }

    #[tokio::test]
    async fn scheduled_events_keep_insertion_order_at_same_time() {
        let mut driver = driver();
        let open = AppEvent::OpenRoom { job_id: JobId::new("a"), token: None };
        driver.schedule(Duration::ZERO, open);
        driver.schedule(Duration::ZERO, AppEvent::Close);

        assert!(matches!(driver.poll_event().await.unwrap(), Some(AppEvent::OpenRoom { .. })));
        assert!(matches!(driver.poll_event().await.unwrap(), Some(AppEvent::Close)));
    }

    #[tokio::test]
    async fn refused_handshake_is_reported_as_event() {
        let server = create_shared_server(SimServer::new());
        lock(&server).set_refusing(true);
        let mut driver = SimDriver::new(server, SimEnv::new(), "alice");

        driver.open_transport("t").await.unwrap();

        assert!(matches!(
            driver.poll_event().await.unwrap(),
            Some(AppEvent::TransportFailed { .. })
        ));
        assert_eq!(driver.open_attempts(), 1);
        assert!(driver.recv_frame().await.is_none());
    }

    #[tokio::test]
    async fn server_side_drop_is_reported_once() {
        let server = create_shared_server(SimServer::new());
        let mut driver = SimDriver::new(Arc::clone(&server), SimEnv::new(), "alice");
        driver.open_transport("t").await.unwrap();
        assert!(matches!(driver.poll_event().await.unwrap(), Some(AppEvent::TransportOpened)));

        lock(&server).disconnect(driver.client_id());

        assert!(driver.recv_frame().await.is_none());
        assert!(driver.recv_frame().await.is_none());
        assert!(matches!(
            driver.poll_event().await.unwrap(),
            Some(AppEvent::TransportFailed { .. })
        ));
        assert!(driver.poll_event().await.unwrap().is_none());
    }
}
