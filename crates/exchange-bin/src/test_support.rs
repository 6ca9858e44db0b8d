//! Route test harness: a node in a temp data directory whose outbound
//! deliveries are recorded instead of sent.

use crate::app::AppState;
use crate::{api, p2p};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use blob_store::{BlobError, BlobMetadata};
use delivery_queue::{BlobTask, DeliveryResult, MessageTask, Transport};
use exchange_config_and_utils::{Config, Paths};
use parking_lot::Mutex;
use peer_identity::TlsContext;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tower::ServiceExt;

pub const NODE_CERT: &str = include_str!("../../peer-identity/testdata/node-cert.pem");
pub const NODE_KEY: &str = include_str!("../../peer-identity/testdata/node-key.pem");
pub const PEER_CERT: &str = include_str!("../../peer-identity/testdata/peer-cert.pem");

#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Mutex<Vec<MessageTask>>,
    pub blobs: Mutex<Vec<(BlobTask, Vec<u8>)>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, task: &MessageTask) -> DeliveryResult<()> {
        self.messages.lock().push(task.clone());
        Ok(())
    }

    async fn send_blob(&self, task: &BlobTask, mut file: tokio::fs::File) -> DeliveryResult<()> {
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(BlobError::from)?;
        self.blobs.lock().push((task.clone(), content));
        Ok(())
    }
}

pub struct TestNode {
    pub state: AppState,
    pub transport: Arc<RecordingTransport>,
    _dir: TempDir,
}

impl TestNode {
    pub async fn start() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.cert_file(), NODE_CERT).unwrap();
        std::fs::write(paths.key_file(), NODE_KEY).unwrap();

        let tls = TlsContext::load(paths.clone(), Duration::from_secs(2)).unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let state =
            AppState::with_transport(config, paths, Arc::new(tls), transport.clone()).unwrap();

        Self {
            state,
            transport,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub fn p2p_router(&self) -> Router {
        p2p::router(self.state.clone())
    }

    pub async fn store_blob(&self, path: &str, content: &'static [u8]) -> BlobMetadata {
        let body = futures::stream::iter([Ok::<_, std::io::Error>(bytes_of(content))]);
        self.state.blobs.store(path, body).await.unwrap()
    }
}

fn bytes_of(content: &'static [u8]) -> axum::body::Bytes {
    axum::body::Bytes::from_static(content)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// One multipart form part.
pub struct FormPart<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    content: &'a [u8],
}

impl<'a> FormPart<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content,
        }
    }
}

const BOUNDARY: &str = "exchange-test-boundary";

pub fn multipart_request(method: Method, uri: &str, parts: &[FormPart<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send_raw(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

/// Status plus the JSON body, or `Null` for an empty body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = send_raw(router, request).await;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}
