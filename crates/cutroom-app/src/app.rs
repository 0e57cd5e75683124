//! Chat view-model state machine.
//!
//! This module defines [`ChatApp`], which owns everything the project chat
//! view renders: the active room's message store and typing set, the
//! composer, and connection and request errors. It also owns the
//! [`Client`], so room activation can subscribe, join and fetch in one
//! place.
//!
//! This is a pure state machine: it consumes [`AppEvent`] inputs and
//! produces [`AppAction`] instructions for the runtime to execute.
//!
//! # Room activation
//!
//! Opening a room first tears the previous one down: its subscriptions are
//! dropped, its store and typing state cleared, and the server is told we
//! left. Only then are new subscriptions registered, the room joined and its
//! history requested. Each activation gets a fresh [`RequestTag`]; REST
//! completions carrying any other tag are discarded.
//!
//! Live message and delete events that arrive before the history snapshot
//! are held and replayed on top of it, so a message posted during the fetch
//! is neither lost nor duplicated.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use cutroom_client::{
    Client, ClientAction, ClientError, ClientEvent, EventKind, RequestResult, Subscription,
};
use cutroom_core::{
    compose::{Composer, Draft},
    connection::ConnectionState,
    env::Moment,
    error::RequestError,
    reconcile::{RequestScope, ScopedError, validate_reaction},
    store::{DELETED_PLACEHOLDER, MessageStore, ReplyTarget},
    typing::{TypingDebouncer, TypingTracker},
};
use cutroom_proto::{Attachment, InboundEvent, JobId, Message, MessageId, UserId};

use crate::{AppAction, AppEvent, Banner, ChatConfig, RequestTag, RoomStatus};

/// Preview text for a reply whose original is not in the store.
pub const REPLY_NOT_FOUND: &str = "Original message not found";

type Inbox = Arc<Mutex<VecDeque<InboundEvent>>>;

fn lock(inbox: &Inbox) -> MutexGuard<'_, VecDeque<InboundEvent>> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State scoped to one activation of a room.
#[derive(Debug)]
struct ActiveRoom<I> {
    tag: RequestTag,
    status: RoomStatus,
    store: MessageStore,
    typing: TypingTracker<I>,
    /// Live store events received while the snapshot was loading, with
    /// their arrival time.
    held: Vec<(InboundEvent, I)>,
    /// Filled by the subscription handlers, drained by the app.
    inbox: Inbox,
    subscriptions: Vec<Subscription>,
}

impl<I: Moment> ActiveRoom<I> {
    fn subscribe(tag: RequestTag, client: &Client<I>, typing: TypingTracker<I>) -> Self {
        let inbox = Inbox::default();
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let inbox = Arc::clone(&inbox);
                client.on(kind, move |event| lock(&inbox).push_back(event.clone()))
            })
            .collect();

        Self {
            tag,
            status: RoomStatus::Loading,
            store: MessageStore::new(),
            typing,
            held: Vec::new(),
            inbox,
            subscriptions,
        }
    }

    /// Unsubscribe, then clear room state. Returns the room to leave.
    fn teardown(self) -> JobId {
        let Self { tag, subscriptions, mut store, mut typing, .. } = self;
        drop(subscriptions);
        store.clear();
        typing.clear();
        tag.job_id
    }

    fn job_id(&self) -> &JobId {
        &self.tag.job_id
    }

    /// Apply a live event. Returns `true` if anything visible changed.
    fn apply_live(&mut self, event: InboundEvent, me: &UserId, now: I) -> bool {
        if !event.job_id().is_none_or(|job_id| job_id == self.job_id()) {
            tracing::trace!(event = event.name(), "event for another room ignored");
            return false;
        }

        let is_store_event = !matches!(event, InboundEvent::UserTyping(_));
        match self.status {
            RoomStatus::Loading if is_store_event => {
                self.held.push((event, now));
                return false;
            },
            // without history the store stays empty until the room is reopened
            RoomStatus::LoadFailed if is_store_event => {
                tracing::trace!(event = event.name(), "no history loaded, event dropped");
                return false;
            },
            _ => {},
        }

        match event {
            InboundEvent::NewMessage(message) => self.store.append_incoming(message),
            InboundEvent::MessageDeleted(notice) => self.store.mark_deleted(&notice.message_id),
            InboundEvent::UserTyping(notice) if &notice.user_id == me => false,
            InboundEvent::UserTyping(notice) => {
                self.typing.apply(&notice.user_id, &notice.name, notice.is_typing, now)
            },
            InboundEvent::Error(_) => false,
        }
    }

    fn load(&mut self, messages: Vec<Message>, me: &UserId) {
        tracing::debug!(
            tag = %self.tag,
            messages = messages.len(),
            held = self.held.len(),
            "snapshot loaded"
        );
        self.store.initialize_from_snapshot(messages);
        self.status = RoomStatus::Ready;
        for (event, at) in std::mem::take(&mut self.held) {
            self.apply_live(event, me, at);
        }
    }
}

/// Chat view-model state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies, fully testable with virtual time.
#[derive(Debug)]
pub struct ChatApp<I = Instant> {
    config: ChatConfig,
    client: Client<I>,
    /// `None` until a room is opened, and after a configuration error.
    room: Option<ActiveRoom<I>>,
    /// Activation counter for request tags.
    generation: u64,
    composer: Composer,
    /// Draft whose attachments are uploading.
    in_flight: Option<Draft>,
    debouncer: TypingDebouncer<I>,
    banner: Option<Banner>,
    /// Last server `error` event.
    notice: Option<String>,
    request_error: Option<ScopedError>,
}

impl<I: Moment> ChatApp<I> {
    /// Create an app with no active room.
    pub fn new(config: ChatConfig) -> Self {
        let client = Client::new(config.user_id.clone(), config.connection.clone());
        let debouncer =
            TypingDebouncer::new(config.typing.debounce).with_refresh(config.typing.refresh);
        Self {
            config,
            client,
            room: None,
            generation: 0,
            composer: Composer::new(),
            in_flight: None,
            debouncer,
            banner: None,
            notice: None,
            request_error: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent<I>) -> Vec<AppAction> {
        match event {
            AppEvent::OpenRoom { job_id, token } => self.open_room(job_id, token),
            AppEvent::Close => {
                let mut actions = self.close();
                actions.push(AppAction::Render);
                actions
            },
            AppEvent::Quit => {
                let mut actions = self.close();
                actions.push(AppAction::Quit);
                actions
            },
            AppEvent::Tick { now } => self.tick(now),
            AppEvent::TransportOpened => self.forward(ClientEvent::TransportOpened),
            AppEvent::TransportFailed { now, reason } => {
                let mut actions = self.forward(ClientEvent::TransportFailed { now, reason });
                if self.drain_inbox(now) {
                    actions.push(AppAction::Render);
                }
                actions
            },
            AppEvent::FrameReceived { frame, now } => {
                let mut actions = self.forward(ClientEvent::FrameReceived(frame));
                if self.drain_inbox(now) {
                    actions.push(AppAction::Render);
                }
                actions
            },
            AppEvent::Input { text, now } => self.input(text, now),
            AppEvent::AttachFile(file) => {
                self.composer.push_file(file);
                vec![AppAction::Render]
            },
            AppEvent::RemoveFile(index) => {
                if self.composer.remove_file(index).is_none() {
                    return vec![];
                }
                vec![AppAction::Render]
            },
            AppEvent::SetReplyTarget(reply_to) => {
                self.composer.set_reply_target(reply_to);
                vec![AppAction::Render]
            },
            AppEvent::Send => self.send(),
            AppEvent::DismissError => {
                self.request_error = None;
                self.notice = None;
                vec![AppAction::Render]
            },
            AppEvent::React { message_id, emoji } => self.react(message_id, emoji),
            AppEvent::Delete { message_id } => match self.current_tag() {
                Some(tag) => vec![AppAction::DeleteMessage { tag, message_id }],
                None => vec![],
            },
            AppEvent::SnapshotLoaded { tag, result } => {
                if !self.is_current(&tag) {
                    tracing::debug!(%tag, "discarding stale snapshot");
                    return vec![];
                }
                match result {
                    Ok(messages) => {
                        if let Some(room) = self.room.as_mut() {
                            room.load(messages, self.client.user_id());
                        }
                    },
                    Err(error) => {
                        tracing::warn!(%tag, %error, "snapshot fetch failed");
                        if let Some(room) = self.room.as_mut() {
                            room.status = RoomStatus::LoadFailed;
                            room.held.clear();
                        }
                        self.request_error = Some(ScopedError::new(RequestScope::Snapshot, error));
                    },
                }
                vec![AppAction::Render]
            },
            AppEvent::UploadFinished { tag, result } => self.upload_finished(&tag, result),
            AppEvent::ReactionFinished { tag, message_id, emoji, result } => {
                if !self.is_current(&tag) {
                    tracing::debug!(%tag, %message_id, "discarding stale reaction result");
                    return vec![];
                }
                match result {
                    Ok(reactions) => {
                        if let Some(room) = self.room.as_mut() {
                            room.store.apply_reaction(&message_id, &emoji, reactions);
                        }
                    },
                    Err(error) => {
                        tracing::warn!(%message_id, %error, "reaction failed");
                        self.request_error = Some(ScopedError::new(RequestScope::Reaction, error));
                    },
                }
                vec![AppAction::Render]
            },
            AppEvent::DeleteFinished { tag, message_id, result } => {
                if self.is_current(&tag) {
                    return self.delete_finished(tag.job_id, message_id, result);
                }
                if result.is_err() {
                    tracing::debug!(%tag, %message_id, "discarding stale delete failure");
                    return vec![];
                }
                // the server already deleted it; the old room still has to hear about it
                tracing::debug!(%tag, %message_id, "delete confirmed after switch, broadcasting");
                let job_id = tag.job_id;
                self.forward(ClientEvent::BroadcastDelete { job_id, message_id })
            },
        }
    }

    fn open_room(&mut self, job_id: JobId, token: Option<String>) -> Vec<AppAction> {
        let mut actions = self.leave_room();
        self.request_error = None;
        self.notice = None;

        let needs_token = matches!(
            self.client.state(),
            ConnectionState::Uninitialized | ConnectionState::Disconnected | ConnectionState::Failed
        );
        if needs_token {
            let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
                tracing::warn!(%job_id, "no auth token, chat disabled");
                self.banner = Some(Banner::Configuration { message: "missing auth token".into() });
                actions.push(AppAction::Render);
                return actions;
            };
            if let Err(e) = self.try_forward(ClientEvent::Initialize { token }) {
                self.configuration_failed(&e);
                actions.push(AppAction::Render);
                return actions;
            }
        }

        self.generation += 1;
        let tag = RequestTag { job_id: job_id.clone(), generation: self.generation };
        let typing = TypingTracker::new(self.config.typing.expiry);
        let room = ActiveRoom::subscribe(tag.clone(), &self.client, typing);

        match self.try_forward(ClientEvent::JoinRoom { job_id }) {
            Ok(join) => actions.extend(join),
            Err(e) => {
                self.configuration_failed(&e);
                room.teardown();
                actions.push(AppAction::Render);
                return actions;
            },
        }

        tracing::info!(%tag, "room activated");
        self.room = Some(room);
        actions.push(AppAction::FetchSnapshot { tag });
        actions.push(AppAction::Render);
        actions
    }

    /// Tear down the active room, if any.
    fn leave_room(&mut self) -> Vec<AppAction> {
        let Some(room) = self.room.take() else {
            return vec![];
        };

        let mut actions = Vec::new();
        if let Some(is_typing) = self.debouncer.stop() {
            let job_id = room.job_id().clone();
            actions.extend(self.forward(ClientEvent::Typing { job_id, is_typing }));
        }

        let job_id = room.teardown();
        self.composer = Composer::new();
        self.in_flight = None;
        actions.extend(self.forward(ClientEvent::LeaveRoom { job_id }));
        actions
    }

    fn close(&mut self) -> Vec<AppAction> {
        let mut actions = self.leave_room();
        actions.extend(self.forward(ClientEvent::Disconnect));
        actions
    }

    fn tick(&mut self, now: I) -> Vec<AppAction> {
        let mut actions = self.forward(ClientEvent::Tick { now });

        if let Some(is_typing) = self.debouncer.tick(now)
            && let Some(job_id) = self.active_job().cloned()
        {
            actions.extend(self.forward(ClientEvent::Typing { job_id, is_typing }));
        }

        if let Some(room) = self.room.as_mut()
            && room.typing.expire(now) > 0
        {
            actions.push(AppAction::Render);
        }
        actions
    }

    fn input(&mut self, text: String, now: I) -> Vec<AppAction> {
        self.composer.set_text(text);

        let mut actions = Vec::new();
        if let Some(job_id) = self.active_job().cloned()
            && !self.composer.text().trim().is_empty()
            && let Some(is_typing) = self.debouncer.keystroke(now)
        {
            actions.extend(self.forward(ClientEvent::Typing { job_id, is_typing }));
        }
        actions.push(AppAction::Render);
        actions
    }

    fn send(&mut self) -> Vec<AppAction> {
        let Some(tag) = self.current_tag() else {
            return vec![];
        };
        let draft = match self.composer.begin_send() {
            Ok(draft) => draft,
            Err(e) => {
                tracing::debug!(error = %e, "send ignored");
                return vec![];
            },
        };

        if draft.has_files() {
            tracing::debug!(%tag, files = draft.files.len(), "uploading attachments");
            let files = draft.files.clone();
            self.in_flight = Some(draft);
            return vec![AppAction::Upload { tag, files }, AppAction::Render];
        }
        self.dispatch_draft(tag.job_id, draft, Vec::new())
    }

    /// Emit a send and clear the composer. The store only changes when the
    /// server echoes the message back. If the client refuses the frame the
    /// draft stays staged for a retry.
    fn dispatch_draft(
        &mut self,
        job_id: JobId,
        draft: Draft,
        attachments: Vec<Attachment>,
    ) -> Vec<AppAction> {
        let mut actions = Vec::new();
        if let Some(is_typing) = self.debouncer.stop() {
            actions.extend(self.forward(ClientEvent::Typing { job_id: job_id.clone(), is_typing }));
        }

        let Draft { text, reply_to, .. } = draft;
        let message = ClientEvent::SendMessage {
            job_id,
            content: text.trim().to_owned(),
            attachments,
            reply_to,
        };
        match self.try_forward(message) {
            Ok(emitted) => {
                actions.extend(emitted);
                self.composer.complete_send();
            },
            Err(error) => {
                tracing::warn!(%error, "send refused, draft kept");
                self.composer.fail_send();
                let error = RequestError::Network(error.to_string());
                self.request_error = Some(ScopedError::new(RequestScope::Send, error));
            },
        }
        actions.push(AppAction::Render);
        actions
    }

    fn upload_finished(
        &mut self,
        tag: &RequestTag,
        result: RequestResult<Vec<Attachment>>,
    ) -> Vec<AppAction> {
        if !self.is_current(tag) {
            tracing::debug!(%tag, "discarding stale upload result");
            return vec![];
        }
        let Some(draft) = self.in_flight.take() else {
            return vec![];
        };

        match result {
            Ok(attachments) => self.dispatch_draft(tag.job_id.clone(), draft, attachments),
            Err(error) => {
                tracing::warn!(%tag, %error, "upload failed, draft kept");
                self.composer.fail_send();
                self.request_error = Some(ScopedError::new(RequestScope::Upload, error));
                vec![AppAction::Render]
            },
        }
    }

    fn react(&mut self, message_id: MessageId, emoji: String) -> Vec<AppAction> {
        let Some(tag) = self.current_tag() else {
            return vec![];
        };
        if let Err(error) = validate_reaction(&message_id, &emoji) {
            self.request_error = Some(ScopedError::new(RequestScope::Reaction, error));
            return vec![AppAction::Render];
        }
        vec![AppAction::AddReaction { tag, message_id, emoji }]
    }

    fn delete_finished(
        &mut self,
        job_id: JobId,
        message_id: MessageId,
        result: RequestResult<()>,
    ) -> Vec<AppAction> {
        if let Err(error) = result {
            tracing::warn!(%message_id, %error, "delete failed");
            self.request_error = Some(ScopedError::new(RequestScope::Delete, error));
            return vec![AppAction::Render];
        }

        if let Some(room) = self.room.as_mut() {
            room.store.mark_deleted(&message_id);
        }
        let mut actions = self.forward(ClientEvent::BroadcastDelete { job_id, message_id });
        actions.push(AppAction::Render);
        actions
    }

    /// Apply events collected by the room's subscriptions.
    fn drain_inbox(&mut self, now: I) -> bool {
        let Some(room) = self.room.as_mut() else {
            return false;
        };

        let events: Vec<InboundEvent> = lock(&room.inbox).drain(..).collect();
        let mut changed = false;
        for event in events {
            if let InboundEvent::Error(error) = event {
                tracing::warn!(message = %error.message, "server reported an error");
                self.notice = Some(error.message);
                changed = true;
            } else {
                changed |= room.apply_live(event, self.client.user_id(), now);
            }
        }
        changed
    }

    fn forward(&mut self, event: ClientEvent<I>) -> Vec<AppAction> {
        match self.try_forward(event) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!(error = %e, "client rejected event");
                vec![]
            },
        }
    }

    fn try_forward(&mut self, event: ClientEvent<I>) -> Result<Vec<AppAction>, ClientError> {
        let actions = self.client.handle(event)?;
        Ok(self.apply_client(actions))
    }

    fn apply_client(&mut self, client_actions: Vec<ClientAction>) -> Vec<AppAction> {
        let mut actions = Vec::with_capacity(client_actions.len());
        let mut changed = false;

        for action in client_actions {
            match action {
                ClientAction::OpenTransport { token } => {
                    if !matches!(self.banner, Some(Banner::Reconnecting { .. })) {
                        self.banner = Some(Banner::Connecting);
                        changed = true;
                    }
                    actions.push(AppAction::OpenTransport { token });
                },
                ClientAction::CloseTransport => actions.push(AppAction::CloseTransport),
                ClientAction::Send(frame) => actions.push(AppAction::SendFrame(frame)),
                ClientAction::Connected | ClientAction::Disconnected => {
                    self.banner = None;
                    changed = true;
                },
                ClientAction::Reconnecting { attempt, delay } => {
                    tracing::info!(attempt, ?delay, "connection lost, reconnecting");
                    self.banner = Some(Banner::Reconnecting { attempt });
                    changed = true;
                },
                ClientAction::Failed { reason } => {
                    tracing::error!(%reason, "chat connection failed");
                    self.banner = Some(Banner::Failed { reason });
                    changed = true;
                },
            }
        }

        if changed {
            actions.push(AppAction::Render);
        }
        actions
    }

    fn configuration_failed(&mut self, error: &ClientError) {
        tracing::warn!(%error, "chat disabled");
        self.banner = Some(Banner::Configuration { message: error.to_string() });
    }

    fn current_tag(&self) -> Option<RequestTag> {
        self.room.as_ref().map(|room| room.tag.clone())
    }

    fn is_current(&self, tag: &RequestTag) -> bool {
        self.room.as_ref().is_some_and(|room| &room.tag == tag)
    }

    /// Configuration this app was built with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The chat client.
    pub fn client(&self) -> &Client<I> {
        &self.client
    }

    /// Connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Active room, if any.
    pub fn active_job(&self) -> Option<&JobId> {
        self.room.as_ref().map(ActiveRoom::job_id)
    }

    /// Tag of the active room activation.
    pub fn active_tag(&self) -> Option<&RequestTag> {
        self.room.as_ref().map(|room| &room.tag)
    }

    /// History loading state of the active room.
    pub fn room_status(&self) -> Option<RoomStatus> {
        self.room.as_ref().map(|room| room.status)
    }

    /// Message store of the active room.
    pub fn store(&self) -> Option<&MessageStore> {
        self.room.as_ref().map(|room| &room.store)
    }

    /// Messages of the active room in display order.
    pub fn messages(&self) -> &[Message] {
        self.store().map(MessageStore::messages).unwrap_or_default()
    }

    /// Remote typing set of the active room.
    pub fn typing(&self) -> Option<&TypingTracker<I>> {
        self.room.as_ref().map(|room| &room.typing)
    }

    /// Typing indicator text.
    pub fn typing_label(&self) -> Option<String> {
        self.typing().and_then(TypingTracker::label)
    }

    /// Preview shown above a reply.
    pub fn reply_preview(&self, reply_to: &MessageId) -> String {
        let target =
            self.store().map_or(ReplyTarget::NotFound, |s| s.resolve_reply_target(reply_to));
        match target {
            ReplyTarget::Found(message) => message.content.clone(),
            ReplyTarget::Deleted(_) => DELETED_PLACEHOLDER.to_owned(),
            ReplyTarget::NotFound => REPLY_NOT_FOUND.to_owned(),
        }
    }

    /// Composer state.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// True while our "typing" signal is outstanding.
    pub fn is_typing(&self) -> bool {
        self.debouncer.is_typing()
    }

    /// Connection or configuration banner.
    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Last server `error` event.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Last failed request, scoped to its operation.
    pub fn request_error(&self) -> Option<&ScopedError> {
        self.request_error.as_ref()
    }

    /// Earliest timer across reconnect, local typing and typing expiry.
    pub fn next_deadline(&self) -> Option<I> {
        let typing = self.typing().and_then(TypingTracker::next_deadline);
        [self.client.next_deadline(), self.debouncer.next_deadline(), typing]
            .into_iter()
            .flatten()
            .min()
    }
}
