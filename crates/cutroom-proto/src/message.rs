//! Chat message payload types.
//!
//! These are the shapes shared by the REST snapshot and the live
//! `newMessage` event. Timestamps are Unix milliseconds (UTC); the backend
//! may also send them as RFC 3339 strings, which are converted on decode.

use serde::{Deserialize, Serialize};

use crate::{JobId, MessageId, UserId};

/// A chat message in a job room.
///
/// `reply_to` is a reference by id, never an embedded copy, so edits and
/// deletes of the original are visible through the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within the room for the lifetime of the session.
    pub id: MessageId,

    /// Author of the message.
    pub sender_id: UserId,

    /// Text body. Replaced by a placeholder once the message is deleted.
    #[serde(default)]
    pub content: String,

    /// Attachments in upload order.
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Message this one replies to.
    #[serde(default, alias = "replyToId", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,

    /// Server-confirmed reaction aggregate.
    #[serde(default)]
    pub reactions: Vec<Reaction>,

    /// Creation instant in Unix milliseconds. Immutable.
    #[serde(default, alias = "createdAt", deserialize_with = "unix_millis::deserialize")]
    pub timestamp: u64,

    /// Tombstone flag. Terminal once set.
    #[serde(default)]
    pub is_deleted: bool,

    /// Room the message was posted in, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

impl Message {
    /// Tag the message with the room it belongs to.
    #[must_use]
    pub fn in_room(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Plain text message with no attachments, reply or reactions.
    pub fn text(id: impl Into<MessageId>, sender_id: impl Into<UserId>, content: &str) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            content: content.to_owned(),
            attachments: Vec::new(),
            reply_to: None,
            reactions: Vec::new(),
            timestamp: 0,
            is_deleted: false,
            job_id: None,
        }
    }
}

/// Server-side stored file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment identifier.
    pub id: String,
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Download URL.
    pub url: String,
    /// Upload instant in Unix milliseconds.
    #[serde(default, deserialize_with = "unix_millis::deserialize")]
    pub uploaded_at: u64,
    /// Uploader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<UserId>,
}

/// Aggregate count for one emoji on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// The emoji.
    pub emoji: String,
    /// Number of users who reacted with it.
    pub count: u32,
}

impl Reaction {
    /// Create a reaction aggregate.
    pub fn new(emoji: impl Into<String>, count: u32) -> Self {
        Self { emoji: emoji.into(), count }
    }
}

mod unix_millis {
    use chrono::DateTime;
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Millis(u64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = match RawTime::deserialize(deserializer)? {
            RawTime::Millis(ms) => return Ok(ms),
            RawTime::Text(text) => text,
        };
        if let Ok(ms) = text.trim().parse::<u64>() {
            return Ok(ms);
        }
        let instant = DateTime::parse_from_rfc3339(text.trim()).map_err(D::Error::custom)?;
        u64::try_from(instant.timestamp_millis())
            .map_err(|_| D::Error::custom(format!("timestamp {text} is before 1970")))
    }
}
