//! REST implementation of [`MessageApi`] on `reqwest`.
//!
//! Every request carries the bearer token. Successful bodies are unwrapped
//! from their `{data: ...}` envelope; failure statuses are mapped to
//! [`RequestError`] with the server's `message` field when it sent one.

use async_trait::async_trait;
use cutroom_core::{compose::PendingFile, error::RequestError};
use cutroom_proto::{
    Attachment, JobId, Message, MessageId, Reaction,
    api::{
        DataEnvelope, ErrorBody, ReactionRequest, ReactionsPayload, UPLOAD_PATH, message_path,
        messages_path, reactions_path,
    },
};
use reqwest::{
    Response,
    multipart::{Form, Part},
};

use crate::api::{MessageApi, RequestResult};

/// Multipart field name for uploaded files.
const UPLOAD_FIELD: &str = "files";

/// REST client for the message API.
#[derive(Debug, Clone)]
pub struct HttpMessageApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpMessageApi {
    /// Client for `base_url` (e.g. `https://api.example.com/api`).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Client reusing an existing connection pool.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, token: token.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn network(e: &reqwest::Error) -> RequestError {
    RequestError::Network(e.to_string())
}

/// Pass success through; turn anything else into a categorized error.
async fn check(response: Response) -> RequestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    let err = RequestError::from_status(status.as_u16(), body.message);
    tracing::warn!(status = status.as_u16(), error = %err, "request failed");
    Err(err)
}

async fn data<T: serde::de::DeserializeOwned>(response: Response) -> RequestResult<T> {
    let status = response.status().as_u16();
    response.json::<DataEnvelope<T>>().await.map(|env| env.data).map_err(|e| {
        RequestError::Server { status, message: Some(format!("unreadable response: {e}")) }
    })
}

#[async_trait]
impl MessageApi for HttpMessageApi {
    async fn fetch_messages(&self, job_id: &JobId) -> RequestResult<Vec<Message>> {
        let response = self
            .http
            .get(self.url(&messages_path(job_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| network(&e))?;
        data(check(response).await?).await
    }

    async fn upload(&self, files: &[PendingFile]) -> RequestResult<Vec<Attachment>> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|_| RequestError::InvalidArgument { field: "file type" })?;
            form = form.part(UPLOAD_FIELD, part);
        }

        let response = self
            .http
            .post(self.url(UPLOAD_PATH))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network(&e))?;
        data(check(response).await?).await
    }

    async fn add_reaction(
        &self,
        message_id: &MessageId,
        emoji: &str,
    ) -> RequestResult<Vec<Reaction>> {
        let response = self
            .http
            .post(self.url(&reactions_path(message_id)))
            .bearer_auth(&self.token)
            .json(&ReactionRequest { emoji: emoji.to_owned() })
            .send()
            .await
            .map_err(|e| network(&e))?;
        let payload: ReactionsPayload = data(check(response).await?).await?;
        Ok(payload.reactions)
    }

    async fn delete_message(&self, message_id: &MessageId) -> RequestResult<()> {
        let response = self
            .http
            .delete(self.url(&message_path(message_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| network(&e))?;
        check(response).await.map(|_| ())
    }
}
