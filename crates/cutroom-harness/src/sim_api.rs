//! REST backend over the simulated server.

use async_trait::async_trait;
use cutroom_client::{MessageApi, RequestResult};
use cutroom_core::compose::PendingFile;
use cutroom_proto::{Attachment, JobId, Message, MessageId, Reaction};

use crate::sim_server::{SharedSimServer, lock};

/// [`MessageApi`] answered by a [`crate::SimServer`].
///
/// Calls complete on their first poll; the runtime still collects them as
/// in-flight requests, so ordering against socket frames is exercised.
#[derive(Debug, Clone)]
pub struct SimApi {
    server: SharedSimServer,
}

impl SimApi {
    /// Create a backend for `server`.
    pub fn new(server: SharedSimServer) -> Self {
        Self { server }
    }
}

#[async_trait]
impl MessageApi for SimApi {
    async fn fetch_messages(&self, job_id: &JobId) -> RequestResult<Vec<Message>> {
        lock(&self.server).fetch(job_id)
    }

    async fn upload(&self, files: &[PendingFile]) -> RequestResult<Vec<Attachment>> {
        lock(&self.server).upload(files)
    }

    async fn add_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> RequestResult<Vec<Reaction>> {
        lock(&self.server).react(message_id, emoji)
    }

    async fn delete_message(&self, message_id: &MessageId) -> RequestResult<()> {
        lock(&self.server).delete(message_id)
    }
}
