//! Client-side message log for the active room.
//!
//! Arrival order is display order: the store never reorders by timestamp.
//! Messages are never physically removed once inserted; deletes leave a
//! tombstone. Insertion is idempotent by id, which is the only guard against
//! the send-echo race and at-least-once delivery from the transport.

use std::collections::HashMap;

use cutroom_proto::{Message, MessageId, Reaction};

/// Content shown in place of a deleted message.
pub const DELETED_PLACEHOLDER: &str = "This message has been deleted";

/// Resolution of a reply reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget<'a> {
    /// Target is present and visible.
    Found(&'a Message),
    /// Target is present but tombstoned.
    Deleted(&'a Message),
    /// Target is not in the store.
    NotFound,
}

/// Ordered, idempotent message log.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// Position of each id in `messages`
    index: HashMap<MessageId, usize>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content with a fetched snapshot.
    ///
    /// Duplicate ids inside the snapshot keep their first occurrence.
    pub fn initialize_from_snapshot(&mut self, messages: Vec<Message>) {
        self.clear();
        for message in messages {
            self.insert(message);
        }
    }

    /// Append a live message at the tail.
    ///
    /// Returns `false` (and changes nothing) if the id is already present.
    pub fn append_incoming(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            tracing::debug!(message_id = %message.id, "duplicate message ignored");
            return false;
        }
        self.insert(message);
        true
    }

    /// Tombstone a message.
    ///
    /// Returns `false` if the id is unknown; the delete may have raced ahead
    /// of the snapshot.
    pub fn mark_deleted(&mut self, message_id: &MessageId) -> bool {
        let Some(message) = self.get_mut(message_id) else {
            tracing::debug!(%message_id, "delete for unknown message ignored");
            return false;
        };
        tombstone(message);
        true
    }

    /// Replace a message's reactions with the server-confirmed aggregate.
    ///
    /// Applies to tombstones too; their content stays the placeholder.
    /// Returns `false` if the id is unknown.
    pub fn apply_reaction(
        &mut self,
        message_id: &MessageId,
        emoji: &str,
        reactions: Vec<Reaction>,
    ) -> bool {
        let Some(message) = self.get_mut(message_id) else {
            tracing::debug!(%message_id, emoji, "reaction for unknown message ignored");
            return false;
        };
        message.reactions = reactions;
        true
    }

    /// Look up the message a reply points at.
    pub fn resolve_reply_target(&self, reply_id: &MessageId) -> ReplyTarget<'_> {
        match self.get(reply_id) {
            Some(message) if message.is_deleted => ReplyTarget::Deleted(message),
            Some(message) => ReplyTarget::Found(message),
            None => ReplyTarget::NotFound,
        }
    }

    /// Message by id.
    pub fn get(&self, message_id: &MessageId) -> Option<&Message> {
        self.index.get(message_id).and_then(|&pos| self.messages.get(pos))
    }

    /// True if a message with this id is present.
    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.index.contains_key(message_id)
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Ids in display order.
    pub fn ids(&self) -> impl Iterator<Item = &MessageId> {
        self.messages.iter().map(|m| &m.id)
    }

    /// Number of messages, tombstones included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the store holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }

    fn insert(&mut self, mut message: Message) {
        if self.index.contains_key(&message.id) {
            return;
        }
        if message.is_deleted {
            tombstone(&mut message);
        }
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }

    fn get_mut(&mut self, message_id: &MessageId) -> Option<&mut Message> {
        let pos = *self.index.get(message_id)?;
        self.messages.get_mut(pos)
    }
}

fn tombstone(message: &mut Message) {
    message.is_deleted = true;
    DELETED_PLACEHOLDER.clone_into(&mut message.content);
    message.attachments.clear();
}
