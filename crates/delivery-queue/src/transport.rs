//! Wire calls to a peer's `/api/v1` surface.

use crate::{BlobTask, DeliveryError, DeliveryResult, MessageTask};
use async_trait::async_trait;
use peer_identity::TlsContext;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// One attempt at a peer call. Retries are the caller's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, task: &MessageTask) -> DeliveryResult<()>;

    /// Stream `file` as the `blob` part of a multipart upload.
    async fn send_blob(&self, task: &BlobTask, file: tokio::fs::File) -> DeliveryResult<()>;
}

/// Supplies the HTTP client for each call, so TLS trust changes are picked
/// up by the next attempt.
pub trait ClientSource: Send + Sync {
    fn client(&self) -> Client;
}

impl ClientSource for Client {
    fn client(&self) -> Client {
        self.clone()
    }
}

impl ClientSource for TlsContext {
    fn client(&self) -> Client {
        TlsContext::client(self)
    }
}

pub struct HttpTransport {
    clients: Arc<dyn ClientSource>,
}

impl HttpTransport {
    pub fn new(clients: Arc<dyn ClientSource>) -> Self {
        Self { clients }
    }
}

fn destination_fields(mut form: Form, sender: Option<&str>, recipient: Option<&str>) -> Form {
    if let Some(destination) = sender {
        form = form.text("senderDestination", destination.to_string());
    }
    if let Some(destination) = recipient {
        form = form.text("recipientDestination", destination.to_string());
    }
    form
}

async fn check_status(url: &str, response: Response) -> DeliveryResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(DeliveryError::NotFound {
            url: url.to_string(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_message(&self, task: &MessageTask) -> DeliveryResult<()> {
        let url = format!("{}/api/v1/messages", task.endpoint);

        let mut form = Form::new().text("message", task.message.clone());
        if let Some(headers) = &task.headers {
            form = form.text("headers", serde_json::to_string(headers)?);
        }
        let form = destination_fields(
            form,
            task.sender.destination.as_deref(),
            task.recipient.destination.as_deref(),
        );

        let response = self.clients.client().post(&url).multipart(form).send().await?;
        check_status(&url, response).await
    }

    async fn send_blob(&self, task: &BlobTask, file: tokio::fs::File) -> DeliveryResult<()> {
        let url = format!("{}/api/v1/blobs{}", task.endpoint, task.path);

        let size = file.metadata().await.map_err(blob_store::BlobError::from)?.len();
        let file_name = task
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), size)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;

        // Destinations go first so the receiver can validate before streaming.
        let form = destination_fields(
            Form::new(),
            task.sender.destination.as_deref(),
            task.recipient.destination.as_deref(),
        )
        .part("blob", part);

        let response = self.clients.client().put(&url).multipart(form).send().await?;
        check_status(&url, response).await
    }
}
