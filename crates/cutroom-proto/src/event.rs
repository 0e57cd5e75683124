//! Realtime socket events.
//!
//! Every frame is a JSON text envelope `{"event": <name>, "data": <payload>}`.
//! Outbound events are a serde-tagged enum. Inbound events are decoded in two
//! stages (envelope, then payload by name) so that unknown event names can be
//! ignored without treating them as malformed input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Attachment, JobId, Message, MessageId, ProtoError, UserId};

/// Events the client emits to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent {
    /// Subscribe this socket to a job room.
    JoinJobRoom {
        /// Room to join
        job_id: JobId,
    },

    /// Unsubscribe this socket from a job room.
    LeaveJobRoom {
        /// Room to leave
        job_id: JobId,
    },

    /// Post a message. The server echoes it back as `newMessage`.
    SendMessage {
        /// Target room
        job_id: JobId,
        /// Text body, possibly empty when attachments are present
        content: String,
        /// Server-confirmed attachments from a prior upload
        attachments: Vec<Attachment>,
        /// Message being replied to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to_id: Option<MessageId>,
    },

    /// Local user started or stopped typing.
    Typing {
        /// Target room
        job_id: JobId,
        /// Current typing state
        is_typing: bool,
    },

    /// Tell other participants a message was deleted.
    DeleteMessage {
        /// Target room
        job_id: JobId,
        /// Deleted message
        message_id: MessageId,
    },
}

impl OutboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinJobRoom { .. } => "joinJobRoom",
            Self::LeaveJobRoom { .. } => "leaveJobRoom",
            Self::SendMessage { .. } => "sendMessage",
            Self::Typing { .. } => "typing",
            Self::DeleteMessage { .. } => "deleteMessage",
        }
    }

    /// Room this event is addressed to.
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::JoinJobRoom { job_id }
            | Self::LeaveJobRoom { job_id }
            | Self::SendMessage { job_id, .. }
            | Self::Typing { job_id, .. }
            | Self::DeleteMessage { job_id, .. } => job_id,
        }
    }
}

/// Payload of `messageDeleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNotice {
    /// Message that was deleted
    pub message_id: MessageId,
    /// Room the message belonged to, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// Payload of `userTyping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// User whose typing state changed
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// New typing state
    pub is_typing: bool,
    /// Room, when the server includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Human-readable description
    pub message: String,
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message was posted (including the echo of our own sends).
    NewMessage(Message),
    /// A message was soft-deleted.
    MessageDeleted(DeletedNotice),
    /// A participant's typing state changed.
    UserTyping(TypingNotice),
    /// Server-side or connection-level error.
    Error(ServerError),
}

impl InboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "newMessage",
            Self::MessageDeleted(_) => "messageDeleted",
            Self::UserTyping(_) => "userTyping",
            Self::Error(_) => "error",
        }
    }

    /// Room this event is scoped to. `None` if the payload carries no room.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::NewMessage(msg) => msg.job_id.as_ref(),
            Self::MessageDeleted(notice) => notice.job_id.as_ref(),
            Self::UserTyping(notice) => notice.job_id.as_ref(),
            Self::Error(_) => None,
        }
    }

    /// Encode as a wire frame (server side, used by simulations).
    pub fn encode(&self) -> Result<String, ProtoError> {
        let data = match self {
            Self::NewMessage(msg) => serde_json::to_value(msg),
            Self::MessageDeleted(notice) => serde_json::to_value(notice),
            Self::UserTyping(notice) => serde_json::to_value(notice),
            Self::Error(err) => serde_json::to_value(err),
        }
        .map_err(|e| ProtoError::Encode(e.to_string()))?;

        let envelope = Envelope { event: self.name().to_owned(), data };
        serde_json::to_string(&envelope).map_err(|e| ProtoError::Encode(e.to_string()))
    }
}

/// Result of decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A known, well-formed event.
    Event(InboundEvent),
    /// Envelope was valid but the event name is not one we handle.
    Ignored {
        /// Unrecognized event name
        event: String,
    },
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Encode an outbound event as a wire frame.
pub fn encode_outbound(event: &OutboundEvent) -> Result<String, ProtoError> {
    serde_json::to_string(event).map_err(|e| ProtoError::Encode(e.to_string()))
}

/// Decode an inbound wire frame.
///
/// # Errors
///
/// - `ProtoError::MalformedEnvelope` if the frame is not an `{event, data}`
///   object
/// - `ProtoError::InvalidPayload` if a known event carries a payload of the
///   wrong shape
pub fn decode_inbound(frame: &str) -> Result<Decoded, ProtoError> {
    let envelope: Envelope =
        serde_json::from_str(frame).map_err(|e| ProtoError::MalformedEnvelope(e.to_string()))?;

    let Envelope { event, data } = envelope;
    let invalid = |e: serde_json::Error| ProtoError::InvalidPayload {
        event: event.clone(),
        reason: e.to_string(),
    };

    let decoded = match event.as_str() {
        "newMessage" => InboundEvent::NewMessage(serde_json::from_value(data).map_err(invalid)?),
        "messageDeleted" => {
            InboundEvent::MessageDeleted(serde_json::from_value(data).map_err(invalid)?)
        },
        "userTyping" => InboundEvent::UserTyping(serde_json::from_value(data).map_err(invalid)?),
        "error" => InboundEvent::Error(serde_json::from_value(data).map_err(invalid)?),
        _ => return Ok(Decoded::Ignored { event: event.clone() }),
    };

    Ok(Decoded::Event(decoded))
}

/// Decode an outbound frame (server side, used by simulations).
pub fn decode_outbound(frame: &str) -> Result<OutboundEvent, ProtoError> {
    serde_json::from_str(frame).map_err(|e| ProtoError::MalformedEnvelope(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_is_ignored() {
        let decoded = decode_inbound(r#"{"event":"presence","data":{"online":3}}"#).unwrap();
        assert_eq!(decoded, Decoded::Ignored { event: "presence".into() });
    }

    #[test]
    fn known_event_with_bad_payload_is_an_error() {
        let result = decode_inbound(r#"{"event":"userTyping","data":{"isTyping":"yes"}}"#);
        assert!(matches!(result, Err(ProtoError::InvalidPayload { .. })));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode_inbound("not json"), Err(ProtoError::MalformedEnvelope(_))));
        assert!(matches!(decode_inbound("[1,2]"), Err(ProtoError::MalformedEnvelope(_))));
    }

    #[test]
    fn deleted_notice_without_room() {
        let decoded = decode_inbound(r#"{"event":"messageDeleted","data":{"messageId":5}}"#);
        let Ok(Decoded::Event(InboundEvent::MessageDeleted(notice))) = decoded else {
            panic!("expected messageDeleted, got {decoded:?}");
        };
        assert_eq!(notice.message_id, MessageId::new("5"));
        assert_eq!(notice.job_id, None);
    }

    #[test]
    fn outbound_name_matches_wire_tag() {
        let event = OutboundEvent::Typing { job_id: JobId::new("j"), is_typing: true };
        let json = encode_outbound(&event).unwrap();
        assert!(json.contains(&format!("\"event\":\"{}\"", event.name())));
    }
}
