//! Synchronous simulated participant.
//!
//! `SimSession` executes a [`ChatApp`]'s actions directly against a
//! [`crate::SimServer`], without an async runtime. Socket frames are
//! delivered when the test calls [`SimSession::pump`]; REST completions are
//! computed when the call is issued but held until the test releases them,
//! so late responses can be interleaved with room switches and live
//! traffic at will.

use std::{collections::VecDeque, time::Duration};

use cutroom_app::{AppAction, AppEvent, ChatApp, ChatConfig};
use cutroom_core::env::Environment;

use crate::{
    invariants::ClientSnapshot,
    sim_env::{SimEnv, SimInstant},
    sim_server::{ClientId, SharedSimServer, lock},
};

/// One participant driven step by step.
#[derive(Debug)]
pub struct SimSession {
    app: ChatApp<SimInstant>,
    env: SimEnv,
    server: SharedSimServer,
    client: ClientId,
    /// Completion events of issued REST calls, oldest first.
    held: VecDeque<AppEvent<SimInstant>>,
    transport_open: bool,
    open_attempts: usize,
    renders: usize,
}

impl SimSession {
    /// Register a participant on `server`.
    pub fn new(server: SharedSimServer, env: SimEnv, config: ChatConfig) -> Self {
        let client = lock(&server).register(config.user_id.clone());
        Self {
            app: ChatApp::new(config),
            env,
            server,
            client,
            held: VecDeque::new(),
            transport_open: false,
            open_attempts: 0,
            renders: 0,
        }
    }

    /// Feed an event and execute everything it leads to, except held REST
    /// completions and undelivered frames.
    pub fn handle(&mut self, event: AppEvent<SimInstant>) {
        let mut events = VecDeque::from([event]);
        while let Some(event) = events.pop_front() {
            let actions = self.app.handle(event);
            for action in actions {
                if let Some(follow_up) = self.execute(action) {
                    events.push_back(follow_up);
                }
            }
        }
    }

    /// Execute one action. Returns the transport lifecycle event it caused.
    fn execute(&mut self, action: AppAction) -> Option<AppEvent<SimInstant>> {
        let mut server = lock(&self.server);
        match action {
            AppAction::Render => self.renders += 1,
            AppAction::Quit => {},
            AppAction::OpenTransport { .. } => {
                self.open_attempts += 1;
                if server.connect(self.client) {
                    self.transport_open = true;
                    return Some(AppEvent::TransportOpened);
                }
                let now = self.env.now();
                return Some(AppEvent::TransportFailed { now, reason: "connection refused".into() });
            },
            AppAction::CloseTransport => {
                self.transport_open = false;
                server.disconnect(self.client);
            },
            AppAction::SendFrame(frame) => {
                if self.transport_open {
                    server.handle_frame(self.client, &frame);
                }
            },
            AppAction::FetchSnapshot { tag } => {
                let result = server.fetch(&tag.job_id);
                self.held.push_back(AppEvent::SnapshotLoaded { tag, result });
            },
            AppAction::Upload { tag, files } => {
                let result = server.upload(&files);
                self.held.push_back(AppEvent::UploadFinished { tag, result });
            },
            AppAction::AddReaction { tag, message_id, emoji } => {
                let result = server.react(&message_id, &emoji);
                self.held.push_back(AppEvent::ReactionFinished { tag, message_id, emoji, result });
            },
            AppAction::DeleteMessage { tag, message_id } => {
                let result = server.delete(&message_id);
                self.held.push_back(AppEvent::DeleteFinished { tag, message_id, result });
            },
        }
        None
    }

    /// Release the oldest held REST completion. Returns `false` if none.
    pub fn resolve_next(&mut self) -> bool {
        self.resolve(0)
    }

    /// Release the held completion at `index`. Returns `false` if none.
    pub fn resolve(&mut self, index: usize) -> bool {
        match self.held.remove(index) {
            Some(event) => {
                self.handle(event);
                true
            },
            None => false,
        }
    }

    /// Release every held completion in issue order.
    pub fn resolve_all(&mut self) {
        while self.resolve_next() {}
    }

    /// Deliver every frame waiting on the server. Reports a dropped
    /// connection as a transport failure.
    ///
    /// Returns the number of frames delivered.
    pub fn pump(&mut self) -> usize {
        if self.transport_open && !lock(&self.server).is_connected(self.client) {
            self.transport_open = false;
            let now = self.env.now();
            self.handle(AppEvent::TransportFailed { now, reason: "connection reset".into() });
        }

        let mut delivered = 0;
        while self.transport_open {
            let Some(frame) = lock(&self.server).next_frame(self.client) else { break };
            let now = self.env.now();
            self.handle(AppEvent::FrameReceived { frame, now });
            delivered += 1;
        }
        delivered
    }

    /// Advance the shared clock and tick.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        self.tick();
    }

    /// Tick at the current time.
    pub fn tick(&mut self) {
        let now = self.env.now();
        self.handle(AppEvent::Tick { now });
    }

    /// Type into the composer at the current time.
    pub fn type_text(&mut self, text: &str) {
        let now = self.env.now();
        self.handle(AppEvent::Input { text: text.to_owned(), now });
    }

    /// The app under test.
    pub fn app(&self) -> &ChatApp<SimInstant> {
        &self.app
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot::from_app(&self.app)
    }

    /// Server-side connection id.
    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Server this participant talks to.
    pub fn server(&self) -> SharedSimServer {
        self.server.clone()
    }

    /// REST completions not yet released.
    pub fn held_requests(&self) -> usize {
        self.held.len()
    }

    /// Handshakes attempted so far.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts
    }

    /// Render requests so far.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Current virtual time.
    pub fn now(&self) -> SimInstant {
        self.env.now()
    }
}
