//! REST message API envelopes.
//!
//! ```text
//! GET    /messages/job/{jobId}        -> {data: Message[]}
//! POST   /messages/upload (multipart) -> {data: Attachment[]}
//! POST   /messages/{id}/reactions     {emoji} -> {data: {reactions}}
//! DELETE /messages/{id}               -> success/failure
//! ```

use serde::{Deserialize, Serialize};

use crate::Reaction;

/// Successful response body. Every endpoint wraps its payload in `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    /// Response payload
    pub data: T,
}

/// Body of `POST /messages/{id}/reactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRequest {
    /// Emoji to add
    pub emoji: String,
}

/// Payload of a successful reaction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionsPayload {
    /// Server-confirmed aggregate after the reaction was applied
    pub reactions: Vec<Reaction>,
}

/// Error response body. Servers are not consistent about including it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Server-provided description
    #[serde(default)]
    pub message: Option<String>,
}

/// Path of the snapshot endpoint for a job.
pub fn messages_path(job_id: &crate::JobId) -> String {
    format!("/messages/job/{job_id}")
}

/// Path of the reaction endpoint for a message.
pub fn reactions_path(message_id: &crate::MessageId) -> String {
    format!("/messages/{message_id}/reactions")
}

/// Path of a single message.
pub fn message_path(message_id: &crate::MessageId) -> String {
    format!("/messages/{message_id}")
}

/// Path of the attachment upload endpoint.
pub const UPLOAD_PATH: &str = "/messages/upload";
