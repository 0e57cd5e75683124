//! REST boundary for message history and mutations.

use std::sync::Arc;

use async_trait::async_trait;
use cutroom_core::{compose::PendingFile, error::RequestError};
use cutroom_proto::{Attachment, JobId, Message, MessageId, Reaction};

/// Result of a REST call.
pub type RequestResult<T> = Result<T, RequestError>;

/// Request/response calls the chat needs from the backend.
///
/// Calls are single-attempt: implementations never retry, and failures are
/// mapped to [`RequestError`] categories.
#[async_trait]
pub trait MessageApi: Send + Sync + 'static {
    /// `GET /messages/job/{jobId}`: history snapshot for a room.
    async fn fetch_messages(&self, job_id: &JobId) -> RequestResult<Vec<Message>>;

    /// `POST /messages/upload`: store files, returning their server shape.
    async fn upload(&self, files: &[PendingFile]) -> RequestResult<Vec<Attachment>>;

    /// `POST /messages/{id}/reactions`: returns the confirmed aggregate.
    async fn add_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> RequestResult<Vec<Reaction>>;

    /// `DELETE /messages/{id}`.
    async fn delete_message(&self, message_id: &MessageId) -> RequestResult<()>;
}

#[async_trait]
impl<T: MessageApi + ?Sized> MessageApi for Arc<T> {
    async fn fetch_messages(&self, job_id: &JobId) -> RequestResult<Vec<Message>> {
        (**self).fetch_messages(job_id).await
    }

    async fn upload(&self, files: &[PendingFile]) -> RequestResult<Vec<Attachment>> {
        (**self).upload(files).await
    }

    async fn add_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> RequestResult<Vec<Reaction>> {
        (**self).add_reaction(message_id, emoji).await
    }

    async fn delete_message(&self, message_id: &MessageId) -> RequestResult<()> {
        (**self).delete_message(message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl MessageApi for Fixed {
        async fn fetch_messages(&self, job_id: &JobId) -> RequestResult<Vec<Message>> {
            Ok(vec![Message::text("1", "u", job_id.as_str())])
        }

        async fn upload(&self, _files: &[PendingFile]) -> RequestResult<Vec<Attachment>> {
            Err(RequestError::from_status(413, None))
        }

        async fn add_reaction(
            &self,
            _message_id: &MessageId,
            emoji: &str,
        ) -> RequestResult<Vec<Reaction>> {
            Ok(vec![Reaction::new(emoji, 1)])
        }

        async fn delete_message(&self, _message_id: &MessageId) -> RequestResult<()> {
            Err(RequestError::NotFound)
        }
    }

    #[tokio::test]
    async fn shared_api_delegates() {
        let api: Arc<dyn MessageApi> = Arc::new(Fixed);

        let messages = api.fetch_messages(&JobId::new("j9")).await.unwrap();
        assert_eq!(messages[0].content, "j9");
        assert_eq!(
            api.add_reaction(&MessageId::new("1"), "🎬").await.unwrap(),
            vec![Reaction::new("🎬", 1)]
        );
        assert_eq!(api.delete_message(&MessageId::new("1")).await, Err(RequestError::NotFound));
        assert!(matches!(api.upload(&[]).await, Err(RequestError::Server { status: 413, .. })));
    }
}
