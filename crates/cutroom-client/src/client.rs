//! Client state machine.
//!
//! The `Client` combines the connection lifecycle with room membership and
//! outbound emission over the single shared transport. Inbound frames are
//! decoded at this boundary and handed to [`EventBus`] subscribers as typed
//! events.

use std::collections::VecDeque;

use cutroom_core::{
    connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState},
    env::Moment,
};
use cutroom_proto::{
    Decoded, InboundEvent, JobId, OutboundEvent, ServerError, UserId, decode_inbound,
    encode_outbound,
};

use crate::{
    bus::{EventBus, EventKind, Subscription},
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Chat client for one transport session.
///
/// Explicitly constructed and owned by the application; there is no global
/// instance. Generic over `I` (Instant type) for virtual time in tests.
#[derive(Debug)]
pub struct Client<I> {
    connection: Connection<I>,
    /// Local user, used to recognize our own echoes.
    user_id: UserId,
    /// Rooms this session is in, in join order. Re-joined after reconnect.
    rooms: Vec<JobId>,
    /// Frames emitted while the transport was (re)connecting.
    outbox: VecDeque<OutboundEvent>,
    bus: EventBus,
}

impl<I: Moment> Client<I> {
    /// Create a client in the uninitialized state.
    pub fn new(user_id: impl Into<UserId>, config: ConnectionConfig) -> Self {
        Self {
            connection: Connection::new(config),
            user_id: user_id.into(),
            rooms: Vec::new(),
            outbox: VecDeque::new(),
            bus: EventBus::new(),
        }
    }

    /// Local user id.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Underlying connection state machine.
    pub fn connection(&self) -> &Connection<I> {
        &self.connection
    }

    /// Rooms this session is in.
    pub fn rooms(&self) -> &[JobId] {
        &self.rooms
    }

    /// True if the session is in `job_id`.
    pub fn is_joined(&self, job_id: &JobId) -> bool {
        self.rooms.contains(job_id)
    }

    /// Frames waiting for the transport.
    pub fn pending_frames(&self) -> usize {
        self.outbox.len()
    }

    /// Event bus inbound events are dispatched on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to an inbound event. Dropping the guard unsubscribes.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Unsubscribe.
    pub fn off(&self, subscription: Subscription) {
        subscription.unsubscribe();
    }

    /// When the next timer fires, if any.
    pub fn next_deadline(&self) -> Option<I> {
        self.connection.next_deadline()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connection` for lifecycle misuse: initializing twice,
    ///   a blank token, or joining before any token was configured
    /// - `ClientError::Proto` if an outbound event fails to encode
    /// - `ClientError::Offline` if a message or delete broadcast is emitted
    ///   while no transport is open or being opened
    pub fn handle(&mut self, event: ClientEvent<I>) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Initialize { token } => self.handle_initialize(token),
            ClientEvent::Connect => {
                let actions = self.connection.connect()?;
                self.apply(actions)
            },
            ClientEvent::Disconnect => self.handle_disconnect(),
            ClientEvent::TransportOpened => {
                let actions = self.connection.transport_opened();
                self.apply(actions)
            },
            ClientEvent::TransportFailed { now, reason } => {
                let actions = self.connection.transport_failed(now, &reason);
                self.apply(actions)
            },
            ClientEvent::FrameReceived(frame) => {
                self.handle_frame(&frame);
                Ok(vec![])
            },
            ClientEvent::Tick { now } => {
                let actions = self.connection.tick(now);
                self.apply(actions)
            },
            ClientEvent::JoinRoom { job_id } => self.handle_join(job_id),
            ClientEvent::LeaveRoom { job_id } => self.handle_leave(&job_id),
            ClientEvent::SendMessage { job_id, content, attachments, reply_to } => self.emit(
                OutboundEvent::SendMessage { job_id, content, attachments, reply_to_id: reply_to },
            ),
            ClientEvent::Typing { job_id, is_typing } => {
                self.emit(OutboundEvent::Typing { job_id, is_typing })
            },
            ClientEvent::BroadcastDelete { job_id, message_id } => {
                self.emit(OutboundEvent::DeleteMessage { job_id, message_id })
            },
        }
    }

    fn handle_initialize(&mut self, token: String) -> Result<Vec<ClientAction>, ClientError> {
        if let Err(e) = self.connection.initialize(token) {
            tracing::warn!(error = %e, "initialize rejected");
            return Err(e.into());
        }
        tracing::debug!("transport credential configured");
        Ok(vec![])
    }

    fn handle_disconnect(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let dropped = self.outbox.len();
        self.outbox.clear();
        self.rooms.clear();

        let teardown = self.connection.disconnect();
        let mut actions = self.apply(teardown)?;
        actions.push(ClientAction::Disconnected);
        tracing::info!(dropped, "disconnected");
        Ok(actions)
    }

    fn handle_frame(&self, frame: &str) {
        match decode_inbound(frame) {
            Ok(Decoded::Event(event)) => {
                let handlers = self.bus.dispatch(&event);
                tracing::trace!(event = event.name(), handlers, "inbound event dispatched");
            },
            Ok(Decoded::Ignored { event }) => {
                tracing::debug!(%event, "ignoring unknown event");
            },
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
            },
        }
    }

    fn handle_join(&mut self, job_id: JobId) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::new();
        if !self.connection.state().is_active() {
            tracing::debug!(%job_id, "join requested while offline, connecting first");
            let connect = self.connection.connect()?;
            actions = self.apply(connect)?;
        }

        if self.rooms.contains(&job_id) {
            return Ok(actions);
        }

        tracing::info!(%job_id, "joining room");
        self.rooms.push(job_id.clone());
        if self.connection.is_connected() {
            actions.push(send(&OutboundEvent::JoinJobRoom { job_id })?);
        }
        Ok(actions)
    }

    fn handle_leave(&mut self, job_id: &JobId) -> Result<Vec<ClientAction>, ClientError> {
        let Some(pos) = self.rooms.iter().position(|r| r == job_id) else {
            return Ok(vec![]);
        };

        tracing::info!(%job_id, "leaving room");
        self.rooms.remove(pos);
        self.outbox.retain(|e| e.job_id() != job_id);

        if self.connection.is_connected() {
            Ok(vec![send(&OutboundEvent::LeaveJobRoom { job_id: job_id.clone() })?])
        } else {
            Ok(vec![])
        }
    }

    /// Send now, buffer until connected, or refuse.
    ///
    /// Typing signals are dropped while offline; anything else is refused so
    /// the caller can keep what it was about to send.
    fn emit(&mut self, event: OutboundEvent) -> Result<Vec<ClientAction>, ClientError> {
        if self.connection.is_connected() {
            return Ok(vec![send(&event)?]);
        }

        let state = self.connection.state();
        if matches!(event, OutboundEvent::Typing { .. }) {
            tracing::trace!(?state, "dropping typing signal while offline");
            return Ok(vec![]);
        }
        if !state.is_active() {
            tracing::warn!(event = event.name(), ?state, "refusing event, transport is down");
            return Err(ClientError::Offline { event: event.name(), state });
        }

        tracing::debug!(event = event.name(), ?state, "buffering until connected");
        self.outbox.push_back(event);
        Ok(vec![])
    }

    /// Translate connection actions, adding the session work they trigger.
    fn apply(
        &mut self,
        connection_actions: Vec<ConnectionAction>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::with_capacity(connection_actions.len());

        for action in connection_actions {
            match action {
                ConnectionAction::OpenTransport { token } => {
                    actions.push(ClientAction::OpenTransport { token });
                },
                ConnectionAction::CloseTransport => actions.push(ClientAction::CloseTransport),
                ConnectionAction::Connected => {
                    tracing::info!(
                        rooms = self.rooms.len(),
                        buffered = self.outbox.len(),
                        "transport connected"
                    );
                    actions.push(ClientAction::Connected);
                    for job_id in &self.rooms {
                        let join = OutboundEvent::JoinJobRoom { job_id: job_id.clone() };
                        actions.push(send(&join)?);
                    }
                    while let Some(event) = self.outbox.pop_front() {
                        actions.push(send(&event)?);
                    }
                },
                ConnectionAction::Reconnecting { attempt, delay } => {
                    actions.push(ClientAction::Reconnecting { attempt, delay });
                },
                ConnectionAction::Failed { reason } => {
                    self.outbox.clear();
                    let notice = InboundEvent::Error(ServerError { message: reason.clone() });
                    self.bus.dispatch(&notice);
                    actions.push(ClientAction::Failed { reason });
                },
            }
        }
        Ok(actions)
    }
}

fn send(event: &OutboundEvent) -> Result<ClientAction, ClientError> {
    Ok(ClientAction::Send(encode_outbound(event)?))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Instant,
    };

    use cutroom_core::error::ConnectionError;
    use cutroom_proto::{Message, decode_outbound};

    use super::*;

    fn client() -> Client<Instant> {
        let mut client = Client::new("me", ConnectionConfig::default());
        client.handle(ClientEvent::Initialize { token: "secret".into() }).unwrap();
        client
    }

    fn connected() -> Client<Instant> {
        let mut client = client();
        client.handle(ClientEvent::Connect).unwrap();
        client.handle(ClientEvent::TransportOpened).unwrap();
        client
    }

    fn sent(actions: &[ClientAction]) -> Vec<OutboundEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                ClientAction::Send(frame) => Some(decode_outbound(frame).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn job(id: &str) -> JobId {
        JobId::new(id)
    }

    #[test]
    fn join_while_offline_connects_then_joins() {
        let mut client = client();

        let actions = client.handle(ClientEvent::JoinRoom { job_id: job("j1") }).unwrap();
        assert!(matches!(
            actions.as_slice(),
            [ClientAction::OpenTransport { token }] if token == "secret"
        ));
        assert_eq!(client.state(), ConnectionState::Connecting);

        let actions = client.handle(ClientEvent::TransportOpened).unwrap();
        assert_eq!(sent(&actions), vec![OutboundEvent::JoinJobRoom { job_id: job("j1") }]);
    }

    #[test]
    fn join_before_initialize_is_configuration_error() {
        let mut client: Client<Instant> = Client::new("me", ConnectionConfig::default());

        let err = client.handle(ClientEvent::JoinRoom { job_id: job("j1") }).unwrap_err();

        assert_eq!(err, ClientError::Connection(ConnectionError::NotInitialized));
        assert!(err.is_configuration());
        assert!(client.rooms().is_empty());
    }

    #[test]
    fn double_initialize_keeps_first_token() {
        let mut client = client();
        let err = client.handle(ClientEvent::Initialize { token: "other".into() }).unwrap_err();
        assert!(err.is_configuration());

        let actions = client.handle(ClientEvent::Connect).unwrap();
        assert_eq!(actions, vec![ClientAction::OpenTransport { token: "secret".into() }]);
    }

    #[test]
    fn frames_buffer_while_connecting_and_typing_is_dropped() {
        let mut client = client();
        client.handle(ClientEvent::JoinRoom { job_id: job("j1") }).unwrap();

        client
            .handle(ClientEvent::SendMessage {
                job_id: job("j1"),
                content: "first".into(),
                attachments: vec![],
                reply_to: None,
            })
            .unwrap();
        client.handle(ClientEvent::Typing { job_id: job("j1"), is_typing: true }).unwrap();
        assert_eq!(client.pending_frames(), 1);

        let actions = client.handle(ClientEvent::TransportOpened).unwrap();
        let names: Vec<_> = sent(&actions).iter().map(OutboundEvent::name).collect();
        assert_eq!(names, ["joinJobRoom", "sendMessage"]);
        assert_eq!(client.pending_frames(), 0);
    }

    #[test]
    fn rooms_rejoined_after_reconnect() {
        let mut client = connected();
        client.handle(ClientEvent::JoinRoom { job_id: job("a") }).unwrap();
        client.handle(ClientEvent::JoinRoom { job_id: job("b") }).unwrap();
        let t0 = Instant::now();

        let actions = client
            .handle(ClientEvent::TransportFailed { now: t0, reason: "reset".into() })
            .unwrap();
        assert!(matches!(actions.as_slice(), [ClientAction::Reconnecting { attempt: 1, .. }]));

        let delay = client.connection().config().reconnect_delay;
        let actions = client.handle(ClientEvent::Tick { now: t0 + delay }).unwrap();
        assert!(matches!(actions.as_slice(), [ClientAction::OpenTransport { .. }]));

        let actions = client.handle(ClientEvent::TransportOpened).unwrap();
        assert_eq!(
            sent(&actions),
            vec![
                OutboundEvent::JoinJobRoom { job_id: job("a") },
                OutboundEvent::JoinJobRoom { job_id: job("b") },
            ]
        );
    }

    #[test]
    fn leave_drops_membership_and_buffered_frames() {
        let mut client = connected();
        client.handle(ClientEvent::JoinRoom { job_id: job("a") }).unwrap();

        let actions = client.handle(ClientEvent::LeaveRoom { job_id: job("a") }).unwrap();

        assert_eq!(sent(&actions), vec![OutboundEvent::LeaveJobRoom { job_id: job("a") }]);
        assert!(!client.is_joined(&job("a")));
        assert!(client.handle(ClientEvent::LeaveRoom { job_id: job("a") }).unwrap().is_empty());
    }

    #[test]
    fn duplicate_join_is_noop() {
        let mut client = connected();
        client.handle(ClientEvent::JoinRoom { job_id: job("a") }).unwrap();

        let actions = client.handle(ClientEvent::JoinRoom { job_id: job("a") }).unwrap();

        assert!(actions.is_empty());
        assert_eq!(client.rooms(), [job("a")]);
    }

    #[test]
    fn inbound_frames_reach_subscribers() {
        let mut client = connected();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = client.on(EventKind::NewMessage, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let frame = InboundEvent::NewMessage(Message::text("m1", "u2", "hi")).encode().unwrap();
        client.handle(ClientEvent::FrameReceived(frame)).unwrap();
        for junk in [
            r#"{"event":"presence","data":{}}"#,
            "not json",
            r#"{"event":"newMessage","data":{"oops":1}}"#,
        ] {
            client.handle(ClientEvent::FrameReceived(junk.into())).unwrap();
        }

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn disconnect_resets_session() {
        let mut client = connected();
        client.handle(ClientEvent::JoinRoom { job_id: job("a") }).unwrap();

        let actions = client.handle(ClientEvent::Disconnect).unwrap();

        assert_eq!(actions, vec![ClientAction::CloseTransport, ClientAction::Disconnected]);
        assert!(client.rooms().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.handle(ClientEvent::Initialize { token: "fresh".into() }).unwrap();
    }

    #[test]
    fn emit_while_down_is_refused() {
        let mut client = client();

        let err = client
            .handle(ClientEvent::BroadcastDelete { job_id: job("a"), message_id: "m1".into() })
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Offline { event: "deleteMessage", state: ConnectionState::Initialized }
        );
        assert_eq!(client.pending_frames(), 0);

        // typing is stale by the time a transport exists; dropped without complaint
        let actions =
            client.handle(ClientEvent::Typing { job_id: job("a"), is_typing: true }).unwrap();
        assert!(actions.is_empty());
    }
}
