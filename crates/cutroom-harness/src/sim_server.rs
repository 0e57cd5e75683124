//! In-memory chat server.
//!
//! `SimServer` plays the backend for both the socket and the REST surface:
//! it tracks room membership per connection, assigns message ids, fans
//! events out to per-client mailboxes, and answers history, upload,
//! reaction and delete calls from the same stored history.
//!
//! Chaos is opt-in: [`SimServer::with_duplicates`] re-delivers a seeded
//! fraction of frames, the way an at-least-once backend would.

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use cutroom_core::{compose::PendingFile, error::RequestError, store::DELETED_PLACEHOLDER};
use cutroom_proto::{
    Attachment, DeletedNotice, InboundEvent, JobId, Message, MessageId, OutboundEvent, Reaction,
    ServerError, TypingNotice, UserId, decode_outbound,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Connection identifier assigned by [`SimServer::register`].
pub type ClientId = u64;

/// Server shared between simulated participants.
pub type SharedSimServer = Arc<Mutex<SimServer>>;

/// Wrap a server for sharing.
pub fn create_shared_server(server: SimServer) -> SharedSimServer {
    Arc::new(Mutex::new(server))
}

/// Lock a shared server, tolerating poison from a panicked test thread.
pub fn lock(server: &SharedSimServer) -> MutexGuard<'_, SimServer> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// REST operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestCall {
    /// History fetch
    Fetch,
    /// Attachment upload
    Upload,
    /// Reaction
    React,
    /// Delete
    Delete,
}

#[derive(Debug)]
struct Chaos {
    rng: ChaCha8Rng,
    duplicate_rate: f64,
}

/// In-memory chat backend.
#[derive(Debug, Default)]
pub struct SimServer {
    users: HashMap<ClientId, UserId>,
    connected: HashSet<ClientId>,
    rooms: HashMap<JobId, BTreeSet<ClientId>>,
    history: HashMap<JobId, Vec<Message>>,
    mailboxes: HashMap<ClientId, VecDeque<String>>,
    /// Handshakes are refused while set.
    refusing: bool,
    failures: HashMap<RestCall, VecDeque<RequestError>>,
    next_client: ClientId,
    next_message: u64,
    next_attachment: u64,
    chaos: Option<Chaos>,
}

impl SimServer {
    /// Create a well-behaved server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver each frame a second time with probability `rate`, using a
    /// seeded RNG.
    #[must_use]
    pub fn with_duplicates(mut self, seed: u64, rate: f64) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(seed);
        self.chaos = Some(Chaos { rng, duplicate_rate: rate.clamp(0.0, 1.0) });
        self
    }

    /// Register a participant. The connection starts closed.
    pub fn register(&mut self, user_id: impl Into<UserId>) -> ClientId {
        let id = self.next_client;
        self.next_client += 1;
        self.users.insert(id, user_id.into());
        self.mailboxes.insert(id, VecDeque::new());
        id
    }

    /// Refuse or accept new handshakes.
    pub fn set_refusing(&mut self, refusing: bool) {
        self.refusing = refusing;
    }

    /// Accept a handshake. Returns `false` if refused.
    pub fn connect(&mut self, client: ClientId) -> bool {
        if self.refusing || !self.users.contains_key(&client) {
            return false;
        }
        self.connected.insert(client);
        true
    }

    /// Close a connection. The client leaves every room and its mailbox is
    /// discarded.
    pub fn disconnect(&mut self, client: ClientId) {
        self.connected.remove(&client);
        for members in self.rooms.values_mut() {
            members.remove(&client);
        }
        if let Some(mailbox) = self.mailboxes.get_mut(&client) {
            mailbox.clear();
        }
    }

    /// True if the connection is open.
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.connected.contains(&client)
    }

    /// Fail the next call of `call` with `error`.
    pub fn fail_next(&mut self, call: RestCall, error: RequestError) {
        self.failures.entry(call).or_default().push_back(error);
    }

    /// Process a frame sent by `client`.
    pub fn handle_frame(&mut self, client: ClientId, frame: &str) {
        if !self.connected.contains(&client) {
            tracing::debug!(client, "frame from closed connection dropped");
            return;
        }
        let event = match decode_outbound(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(client, error = %e, "malformed frame");
                return;
            },
        };

        match event {
            OutboundEvent::JoinJobRoom { job_id } => {
                self.rooms.entry(job_id).or_default().insert(client);
            },
            OutboundEvent::LeaveJobRoom { job_id } => {
                if let Some(members) = self.rooms.get_mut(&job_id) {
                    members.remove(&client);
                }
            },
            OutboundEvent::SendMessage { job_id, content, attachments, reply_to_id } => {
                let Some(sender_id) = self.users.get(&client).cloned() else { return };
                if !self.is_member(&job_id, client) {
                    let error = ServerError { message: "Not a participant of this job".into() };
                    self.deliver(client, &InboundEvent::Error(error));
                    return;
                }
                let message = self.post(sender_id, &job_id, content, attachments, reply_to_id);
                self.broadcast(&job_id, None, &InboundEvent::NewMessage(message));
            },
            OutboundEvent::Typing { job_id, is_typing } => {
                let Some(user_id) = self.users.get(&client).cloned() else { return };
                let notice = TypingNotice {
                    name: user_id.to_string(),
                    user_id,
                    is_typing,
                    job_id: Some(job_id.clone()),
                };
                self.broadcast(&job_id, Some(client), &InboundEvent::UserTyping(notice));
            },
            OutboundEvent::DeleteMessage { job_id, message_id } => {
                let notice = DeletedNotice { message_id, job_id: Some(job_id.clone()) };
                self.broadcast(&job_id, Some(client), &InboundEvent::MessageDeleted(notice));
            },
        }
    }

    /// Next frame waiting for `client`.
    pub fn next_frame(&mut self, client: ClientId) -> Option<String> {
        self.mailboxes.get_mut(&client)?.pop_front()
    }

    /// Push a server event to every member of a room, as another backend
    /// process would.
    pub fn publish(&mut self, job_id: &JobId, event: &InboundEvent) {
        self.broadcast(job_id, None, event);
    }

    /// `GET /messages/job/{jobId}`.
    pub fn fetch(&mut self, job_id: &JobId) -> Result<Vec<Message>, RequestError> {
        self.scripted(RestCall::Fetch)?;
        Ok(self.history.get(job_id).cloned().unwrap_or_default())
    }

    /// `POST /messages/upload`.
    pub fn upload(&mut self, files: &[PendingFile]) -> Result<Vec<Attachment>, RequestError> {
        self.scripted(RestCall::Upload)?;
        Ok(files
            .iter()
            .map(|file| {
                self.next_attachment += 1;
                let id = format!("att-{}", self.next_attachment);
                Attachment {
                    url: format!("https://files.invalid/{id}/{}", file.name),
                    id,
                    name: file.name.clone(),
                    size: file.size() as u64,
                    mime_type: file.mime_type.clone(),
                    uploaded_at: self.next_attachment,
                    uploaded_by: None,
                }
            })
            .collect())
    }

    /// `POST /messages/{id}/reactions`. Returns the new aggregate.
    pub fn react(
        &mut self,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<Vec<Reaction>, RequestError> {
        self.scripted(RestCall::React)?;
        let message = self.find_mut(message_id).ok_or(RequestError::NotFound)?;
        match message.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) => reaction.count += 1,
            None => message.reactions.push(Reaction::new(emoji, 1)),
        }
        Ok(message.reactions.clone())
    }

    /// `DELETE /messages/{id}`. Tombstones the stored message.
    pub fn delete(&mut self, message_id: &MessageId) -> Result<(), RequestError> {
        self.scripted(RestCall::Delete)?;
        let message = self.find_mut(message_id).ok_or(RequestError::NotFound)?;
        message.is_deleted = true;
        DELETED_PLACEHOLDER.clone_into(&mut message.content);
        message.attachments.clear();
        Ok(())
    }

    /// Stored history of a room.
    pub fn history(&self, job_id: &JobId) -> &[Message] {
        self.history.get(job_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Connections currently in a room.
    pub fn members(&self, job_id: &JobId) -> Vec<ClientId> {
        self.rooms.get(job_id).map(|m| m.iter().copied().collect()).unwrap_or_default()
    }

    fn is_member(&self, job_id: &JobId, client: ClientId) -> bool {
        self.rooms.get(job_id).is_some_and(|m| m.contains(&client))
    }

    fn post(
        &mut self,
        sender_id: UserId,
        job_id: &JobId,
        content: String,
        attachments: Vec<Attachment>,
        reply_to: Option<MessageId>,
    ) -> Message {
        self.next_message += 1;
        let message = Message {
            id: MessageId::new(format!("msg-{}", self.next_message)),
            sender_id,
            content,
            attachments,
            reply_to,
            reactions: Vec::new(),
            timestamp: 1_700_000_000_000 + self.next_message,
            is_deleted: false,
            job_id: Some(job_id.clone()),
        };
        self.history.entry(job_id.clone()).or_default().push(message.clone());
        message
    }

    fn broadcast(&mut self, job_id: &JobId, except: Option<ClientId>, event: &InboundEvent) {
        let members: Vec<ClientId> = self
            .rooms
            .get(job_id)
            .map(|m| m.iter().copied().filter(|c| Some(*c) != except).collect())
            .unwrap_or_default();
        for member in members {
            self.deliver(member, event);
        }
    }

    fn deliver(&mut self, client: ClientId, event: &InboundEvent) {
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "event failed to encode");
                return;
            },
        };
        let duplicate = self.chaos.as_mut().is_some_and(|c| c.rng.gen_bool(c.duplicate_rate));
        let Some(mailbox) = self.mailboxes.get_mut(&client) else { return };
        if duplicate {
            tracing::trace!(client, event = event.name(), "duplicating delivery");
            mailbox.push_back(frame.clone());
        }
        mailbox.push_back(frame);
    }

    fn find_mut(&mut self, message_id: &MessageId) -> Option<&mut Message> {
        self.history.values_mut().flatten().find(|m| &m.id == message_id)
    }

    fn scripted(&mut self, call: RestCall) -> Result<(), RequestError> {
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use cutroom_proto::{Decoded, decode_inbound, encode_outbound};

    use super::*;

    fn send(server: &mut SimServer, client: ClientId, event: &OutboundEvent) {
        server.handle_frame(client, &encode_outbound(event).unwrap());
    }

    fn inbound(server: &mut SimServer, client: ClientId) -> Vec<InboundEvent> {
        std::iter::from_fn(|| server.next_frame(client))
            .map(|frame| match decode_inbound(&frame).unwrap() {
                Decoded::Event(event) => event,
                Decoded::Ignored { event } => panic!("unexpected {event}"),
            })
            .collect()
    }

    fn joined(server: &mut SimServer, user: &str, job: &str) -> ClientId {
        let client = server.register(user);
        assert!(server.connect(client));
        send(server, client, &OutboundEvent::JoinJobRoom { job_id: JobId::new(job) });
        client
    }

    #[test]
    fn send_fans_out_including_sender() {
        let mut server = SimServer::new();
        let a = joined(&mut server, "alice", "j1");
        let b = joined(&mut server, "bob", "j1");
        let c = joined(&mut server, "carol", "j2");

        send(
            &mut server,
            a,
            &OutboundEvent::SendMessage {
                job_id: JobId::new("j1"),
                content: "hi".into(),
                attachments: vec![],
                reply_to_id: None,
            },
        );

        assert_eq!(inbound(&mut server, a).len(), 1);
        assert!(matches!(
            inbound(&mut server, b).as_slice(),
            [InboundEvent::NewMessage(m)] if m.content == "hi"
        ));
        assert!(inbound(&mut server, c).is_empty());
        assert_eq!(server.history(&JobId::new("j1")).len(), 1);
    }

    #[test]
    fn typing_skips_sender() {
        let mut server = SimServer::new();
        let a = joined(&mut server, "alice", "j1");
        let b = joined(&mut server, "bob", "j1");

        send(&mut server, a, &OutboundEvent::Typing { job_id: JobId::new("j1"), is_typing: true });

        assert!(inbound(&mut server, a).is_empty());
        assert_eq!(inbound(&mut server, b).len(), 1);
    }

    #[test]
    fn send_outside_room_is_rejected() {
        let mut server = SimServer::new();
        let a = server.register("alice");
        server.connect(a);

        send(
            &mut server,
            a,
            &OutboundEvent::SendMessage {
                job_id: JobId::new("j1"),
                content: "hi".into(),
                attachments: vec![],
                reply_to_id: None,
            },
        );

        assert!(matches!(inbound(&mut server, a).as_slice(), [InboundEvent::Error(_)]));
        assert!(server.history(&JobId::new("j1")).is_empty());
    }

    #[test]
    fn reactions_aggregate_and_delete_tombstones() {
        let mut server = SimServer::new();
        let a = joined(&mut server, "alice", "j1");
        send(
            &mut server,
            a,
            &OutboundEvent::SendMessage {
                job_id: JobId::new("j1"),
                content: "take 2".into(),
                attachments: vec![],
                reply_to_id: None,
            },
        );
        let id = server.history(&JobId::new("j1"))[0].id.clone();

        server.react(&id, "👍").unwrap();
        let reactions = server.react(&id, "👍").unwrap();
        assert_eq!(reactions, vec![Reaction::new("👍", 2)]);

        server.delete(&id).unwrap();
        let stored = &server.history(&JobId::new("j1"))[0];
        assert!(stored.is_deleted);
        assert_eq!(stored.content, DELETED_PLACEHOLDER);
        assert_eq!(server.delete(&MessageId::new("nope")), Err(RequestError::NotFound));
    }

    #[test]
    fn scripted_failures_fire_once() {
        let mut server = SimServer::new();
        server.fail_next(RestCall::Fetch, RequestError::Unauthorized);

        assert_eq!(server.fetch(&JobId::new("j1")), Err(RequestError::Unauthorized));
        assert_eq!(server.fetch(&JobId::new("j1")), Ok(vec![]));
    }

    #[test]
    fn duplicates_are_seeded() {
        let run = |seed| {
            let mut server = SimServer::new().with_duplicates(seed, 0.5);
            let a = joined(&mut server, "alice", "j1");
            for _ in 0..20 {
                send(
                    &mut server,
                    a,
                    &OutboundEvent::SendMessage {
                        job_id: JobId::new("j1"),
                        content: "x".into(),
                        attachments: vec![],
                        reply_to_id: None,
                    },
                );
            }
            inbound(&mut server, a).len()
        };

        assert_eq!(run(7), run(7));
        assert!(run(7) > 20);
    }

    #[test]
    fn refused_handshake() {
        let mut server = SimServer::new();
        let a = server.register("alice");
        server.set_refusing(true);

        assert!(!server.connect(a));
        assert!(!server.is_connected(a));
    }
}
