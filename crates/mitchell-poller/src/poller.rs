//! The Multi-Server Poller (C8): fans out over every configured server,
//! tags each request with its origin, and routes submission back to it.

use std::collections::HashMap;

use mitchell_types::{AgentResult, Request};

use crate::server_client::ServerClient;

/// Talks to each configured server URL with its own [`ServerClient`] and
/// keeps every fetched [`Request`] tagged with the server it came from, so
/// `claim_request`/`submit_result` route back to the right place.
pub struct MultiServerPoller {
    shop_id: String,
    clients: HashMap<reqwest::Url, ServerClient>,
    default_server: reqwest::Url,
}

impl MultiServerPoller {
    /// Builds one `ServerClient` per URL in `server_urls`. `server_urls`
    /// must be non-empty; the first URL becomes the routing fallback used
    /// when a request is somehow untagged.
    pub fn new(server_urls: Vec<reqwest::Url>, shop_id: impl Into<String>) -> mitchell_types::Result<Self> {
        let default_server = server_urls.first().cloned().ok_or_else(|| {
            mitchell_types::Error::new(mitchell_types::ErrorKind::ConfigInvalid, "no server URLs configured")
        })?;

        let mut clients = HashMap::with_capacity(server_urls.len());
        for url in server_urls {
            tracing::info!(server = %url, "HTTP client initialized");
            clients.insert(url.clone(), ServerClient::new(url)?);
        }

        Ok(Self { shop_id: shop_id.into(), clients, default_server })
    }

    /// Polls every configured server in parallel and returns the combined
    /// set of pending requests, each tagged with its `source_server`.
    /// Per-server failures are tolerated (see [`ServerClient::get_pending_requests`])
    /// and never fail the sweep as a whole.
    pub async fn get_all_pending(&self) -> Vec<Request> {
        let fetches = self.clients.iter().map(|(url, client)| async move {
            let mut requests = client.get_pending_requests(&self.shop_id).await;
            for request in &mut requests {
                request.source_server = Some(url.clone());
            }
            if !requests.is_empty() {
                tracing::info!(server = %url, count = requests.len(), "got pending requests");
            }
            requests
        });

        futures::future::join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Claims `request` on its `source_server`. Returns `false` (not an
    /// error) for a missing tag or a 404 from the server.
    pub async fn claim_request(&self, request: &Request) -> mitchell_types::Result<bool> {
        let Some(source) = request.source_server.as_ref() else {
            tracing::warn!(request_id = %request.id, "request missing source_server tag");
            return Ok(false);
        };

        let Some(client) = self.clients.get(source) else {
            tracing::warn!(request_id = %request.id, server = %source, "no client for server");
            return Ok(false);
        };

        client.claim_request(&request.id).await
    }

    /// Submits `result` to `request`'s `source_server`, falling back to the
    /// first configured server (with a warning) if the tag is somehow
    /// absent, per §4.8's routing invariant.
    pub async fn submit_result(&self, request: &Request, result: &AgentResult) -> mitchell_types::Result<()> {
        let source = request.source_server.as_ref().unwrap_or_else(|| {
            tracing::warn!(
                request_id = %request.id,
                default = %self.default_server,
                "request missing source_server, using default"
            );
            &self.default_server
        });

        let client = self.clients.get(source).ok_or_else(|| {
            mitchell_types::Error::new(
                mitchell_types::ErrorKind::SubmitResultFailed,
                format!("no client for server '{source}'"),
            )
        })?;

        client.submit_result(&request.id, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mitchell_types::Tool;

    fn urls(raw: &[&str]) -> Vec<reqwest::Url> {
        raw.iter().map(|u| reqwest::Url::parse(u).unwrap()).collect()
    }

    #[test]
    fn rejects_empty_server_list() {
        let err = MultiServerPoller::new(vec![], "shop-1").unwrap_err();
        assert_eq!(err.kind(), mitchell_types::ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn claim_without_source_server_tag_returns_false_not_error() {
        let poller = MultiServerPoller::new(urls(&["https://a.example/"]), "shop-1").unwrap();
        let request = Request {
            id: "r1".to_string(),
            tool: Tool::GetTireSpecs,
            vehicle: mitchell_types::VehicleSpec {
                year: 2018,
                make: "Ford".to_string(),
                model: "F-150".to_string(),
                engine: None,
                submodel: None,
                body_style: None,
                drive_type: None,
            },
            params: serde_json::json!({}),
            user_id: None,
            source_server: None,
        };

        let claimed = poller.claim_request(&request).await.unwrap();
        assert!(!claimed);
    }

    #[tokio::test]
    async fn unreachable_servers_return_empty_pending_without_failing_sweep() {
        let poller = MultiServerPoller::new(urls(&["http://127.0.0.1:1/", "http://127.0.0.1:2/"]), "shop-1").unwrap();
        let pending = poller.get_all_pending().await;
        assert!(pending.is_empty());
    }
}
