use super::API_KEY_HEADER;
use crate::app::AppState;
use crate::error::RequestError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Reject requests without the configured API key. Open when none is set.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RequestError> {
    if let Some(expected) = state.config.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            warn!(path = %request.uri().path(), "Rejected request with missing or wrong API key");
            return Err(RequestError::unauthorized());
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get, send, TestNode};
    use axum::http::StatusCode;
    use exchange_config_and_utils::Config;

    async fn protected_node() -> TestNode {
        TestNode::with_config(Config {
            api_key: Some("secret".to_string()),
            ..Config::default()
        })
        .await
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let node = protected_node().await;

        let (status, body) = send(&node.router(), get("/api/v1/id")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let node = protected_node().await;
        let mut request = get("/api/v1/id");
        request
            .headers_mut()
            .insert(API_KEY_HEADER, "guess".parse().unwrap());

        let (status, _) = send(&node.router(), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_matching_key_accepted() {
        let node = protected_node().await;
        let mut request = get("/api/v1/id");
        request
            .headers_mut()
            .insert(API_KEY_HEADER, "secret".parse().unwrap());

        let (status, body) = send(&node.router(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "acme-node1");
    }

    #[tokio::test]
    async fn test_open_without_configured_key() {
        let node = TestNode::start().await;

        let (status, _) = send(&node.router(), get("/api/v1/id")).await;

        assert_eq!(status, StatusCode::OK);
    }
}
