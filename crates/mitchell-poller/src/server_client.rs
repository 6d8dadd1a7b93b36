//! A dedicated HTTP client for one configured job server, per §4.8.

use mitchell_types::{ErrorKind, Request};
use serde::Deserialize;

const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Wraps the `reqwest::Client` for one server and speaks its three routes:
/// pending, claim, and result. Holds no session state of its own — every
/// call is a single round trip.
#[derive(Debug, Clone)]
pub struct ServerClient {
    base_url: reqwest::Url,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct PendingResponse {
    #[serde(default)]
    requests: Vec<Request>,
}

impl ServerClient {
    /// Builds a client for `base_url` with the default 30s request timeout.
    pub fn new(base_url: reqwest::Url) -> mitchell_types::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(mitchell_types::Error::from)?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    /// `GET /api/mitchell/pending/{shop_id}`. Tolerates an empty body (no
    /// pending work) and treats any HTTP-layer failure as "nothing pending"
    /// rather than failing the whole sweep — the caller logs and moves on to
    /// the next server.
    pub async fn get_pending_requests(&self, shop_id: &str) -> Vec<Request> {
        let url = self.base_url.join(&format!("api/mitchell/pending/{shop_id}"));
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(server = %self.base_url, error = %e, "could not build pending-requests URL");
                return Vec::new();
            }
        };

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(server = %self.base_url, error = %e, "HTTP error getting pending requests");
                return Vec::new();
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(server = %self.base_url, error = %e, "HTTP error getting pending requests");
                return Vec::new();
            }
        };

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(server = %self.base_url, error = %e, "failed to read pending-requests body");
                return Vec::new();
            }
        };

        if bytes.is_empty() {
            return Vec::new();
        }

        match serde_json::from_slice::<PendingResponse>(&bytes) {
            Ok(parsed) => parsed.requests,
            Err(e) => {
                tracing::warn!(server = %self.base_url, error = %e, "malformed pending-requests body");
                Vec::new()
            }
        }
    }

    /// `POST /api/mitchell/claim/{request_id}`. A 404 means another agent
    /// already claimed it, not a failure — callers should drop the request
    /// silently. Any other HTTP error propagates.
    pub async fn claim_request(&self, request_id: &str) -> mitchell_types::Result<bool> {
        let url = self
            .base_url
            .join(&format!("api/mitchell/claim/{request_id}"))
            .map_err(|e| mitchell_types::Error::new(ErrorKind::Other, e.to_string()))?;

        let response = self.http.post(url).send().await.map_err(mitchell_types::Error::from)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(request_id, server = %self.base_url, "request already claimed or not found");
            return Ok(false);
        }

        response
            .error_for_status()
            .map(|_| true)
            .map_err(mitchell_types::Error::from)
    }

    /// `POST /api/mitchell/result/{request_id}` with exactly the 8-key
    /// payload from §6.1 — `serde`'s `skip_serializing_if` on
    /// [`mitchell_types::AgentResult`]'s optional fields keeps the shape
    /// closed without needing a separate wire struct here.
    pub async fn submit_result(
        &self,
        request_id: &str,
        result: &mitchell_types::AgentResult,
    ) -> mitchell_types::Result<()> {
        let url = self
            .base_url
            .join(&format!("api/mitchell/result/{request_id}"))
            .map_err(|e| mitchell_types::Error::new(ErrorKind::Other, e.to_string()))?;

        let response = self
            .http
            .post(url)
            .json(result)
            .send()
            .await
            .map_err(|e| submit_failed(request_id, e))?;

        response.error_for_status().map(|_| ()).map_err(|e| submit_failed(request_id, e))
    }
}

fn submit_failed(request_id: &str, source: reqwest::Error) -> mitchell_types::Error {
    mitchell_types::Error::with_source(
        ErrorKind::SubmitResultFailed,
        format!("failed to submit result for request '{request_id}'"),
        Box::new(source),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ServerClient {
        ServerClient::new(reqwest::Url::parse("https://shop.example/").unwrap()).unwrap()
    }

    #[test]
    fn base_url_is_retained() {
        let client = client();
        assert_eq!(client.base_url().as_str(), "https://shop.example/");
    }

    #[tokio::test]
    async fn unreachable_server_returns_empty_pending_list_without_panicking() {
        let client = ServerClient::new(reqwest::Url::parse("http://127.0.0.1:1").unwrap()).unwrap();
        let requests = client.get_pending_requests("shop-1").await;
        assert!(requests.is_empty());
    }
}
