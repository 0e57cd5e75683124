//! Mutation policy and request error scoping.
//!
//! Sends are optimistic: the composer clears as soon as the frame is emitted
//! and the message shows up through the echoed `newMessage`. Reactions and
//! deletes wait for the server before the store changes. The policy is a
//! property of each [`Operation`], so callers and tests can query it instead
//! of inferring it from call sites.

use std::fmt;

use cutroom_proto::MessageId;

use crate::error::RequestError;

/// When the local store reflects a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyPolicy {
    /// Local state changes without waiting for the server.
    Optimistic,
    /// Local state changes only after the server confirms.
    ServerConfirmed,
}

/// User-initiated mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Post a message
    SendMessage,
    /// Add a reaction
    AddReaction,
    /// Soft-delete a message
    DeleteMessage,
}

impl Operation {
    /// Consistency class of this operation.
    pub const fn policy(self) -> ConsistencyPolicy {
        match self {
            Self::SendMessage => ConsistencyPolicy::Optimistic,
            Self::AddReaction | Self::DeleteMessage => ConsistencyPolicy::ServerConfirmed,
        }
    }
}

/// Reject a reaction with blank arguments before any call is made.
pub fn validate_reaction(message_id: &MessageId, emoji: &str) -> Result<(), RequestError> {
    if message_id.is_blank() {
        return Err(RequestError::InvalidArgument { field: "message id" });
    }
    if emoji.trim().is_empty() {
        return Err(RequestError::InvalidArgument { field: "emoji" });
    }
    Ok(())
}

/// Which request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Message emission while the chat is offline
    Send,
    /// Message history fetch
    Snapshot,
    /// Attachment upload
    Upload,
    /// Reaction call
    Reaction,
    /// Delete call
    Delete,
}

impl RequestScope {
    fn describe(self) -> &'static str {
        match self {
            Self::Send => "Couldn't send message",
            Self::Snapshot => "Couldn't load messages",
            Self::Upload => "Couldn't upload attachments",
            Self::Reaction => "Couldn't add reaction",
            Self::Delete => "Couldn't delete message",
        }
    }
}

/// A request error tagged with the operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedError {
    /// Failing operation
    pub scope: RequestScope,
    /// Underlying error
    pub error: RequestError,
}

impl ScopedError {
    /// Tag `error` with `scope`.
    pub fn new(scope: RequestScope, error: RequestError) -> Self {
        Self { scope, error }
    }
}

impl fmt::Display for ScopedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope.describe(), self.error.user_message())
    }
}
