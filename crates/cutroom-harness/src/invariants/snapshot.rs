//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use cutroom_app::{ChatApp, RoomStatus};
use cutroom_client::EventKind;
use cutroom_core::env::Moment;
use cutroom_proto::{JobId, Message, UserId};

/// Snapshot of the entire system state.
///
/// Contains observable state from one or more participants.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-participant state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of one participant's chat view.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Local user.
    pub user_id: UserId,
    /// Room on screen.
    pub active_job: Option<JobId>,
    /// History state of that room.
    pub status: Option<RoomStatus>,
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// Users shown as typing.
    pub typing: Vec<UserId>,
    /// Handlers registered on the client bus.
    pub subscribers: usize,
    /// Handler count expected for one active room.
    pub subscribers_per_room: usize,
    /// Banner text, if any.
    pub banner: Option<String>,
    /// Typing indicator text, if any.
    pub typing_label: Option<String>,
}

impl ClientSnapshot {
    /// Capture the observable state of an app.
    pub fn from_app<I: Moment>(app: &ChatApp<I>) -> Self {
        Self {
            user_id: app.client().user_id().clone(),
            active_job: app.active_job().cloned(),
            status: app.room_status(),
            messages: app.messages().to_vec(),
            typing: app
                .typing()
                .map(|t| t.entries().iter().map(|e| e.user_id.clone()).collect())
                .unwrap_or_default(),
            subscribers: app.client().bus().subscriber_count(),
            subscribers_per_room: EventKind::ALL.len(),
            banner: app.banner().map(ToString::to_string),
            typing_label: app.typing_label(),
        }
    }

    /// Message ids in display order.
    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }

    /// Message contents in display order.
    pub fn contents(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.content.as_str()).collect()
    }
}
