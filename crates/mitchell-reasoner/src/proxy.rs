//! Reasoner backend that proxies decisions through the configured job
//! server rather than calling an LLM provider directly. Useful when shops
//! run agents that must not hold their own model credentials.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use mitchell_types::{retry::with_backoff, Error, ErrorKind, Result};
use serde_json::{json, Value};

use crate::message::{encode_screenshot, Decision, Message, ToolSchema};
use crate::reasoner::Reasoner;

pub struct ProxyReasoner {
    client: reqwest::Client,
    server_url: String,
    request_id: String,
    shop_id: String,
    step: AtomicU32,
}

impl ProxyReasoner {
    pub fn new(server_url: impl Into<String>, request_id: impl Into<String>, shop_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.into(),
            request_id: request_id.into(),
            shop_id: shop_id.into(),
            step: AtomicU32::new(0),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/mitchell/navigate", self.server_url.trim_end_matches('/'))
    }

    fn build_body(&self, goal: &str, turns: &[Message], tools: &[ToolSchema], screenshot: Option<&[u8]>, step: u32) -> Value {
        let page_state = json!({
            "turns": turns,
            "screenshot": screenshot.map(encode_screenshot),
        });

        json!({
            "request_id": self.request_id,
            "shop_id": self.shop_id,
            "goal": goal,
            "page_state": page_state,
            "step": step,
            "tools": tools,
        })
    }

    async fn call_once(&self, body: &Value) -> Result<Decision> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|err| Error::with_source(ErrorKind::Http, "proxy reasoner request failed", Box::new(err)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::new(ErrorKind::ReasonerRateLimited, "proxy reasoner returned 429"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::new(
                ErrorKind::ReasonerProtocolError,
                format!("proxy reasoner returned status {status}: {body}"),
            ));
        }

        let parsed: Value = response.json().await.map_err(|err| {
            Error::with_source(ErrorKind::ReasonerProtocolError, "malformed proxy reasoner response", Box::new(err))
        })?;

        decision_from_envelope(&parsed, &self.request_id)
    }
}

#[async_trait]
impl Reasoner for ProxyReasoner {
    async fn decide(
        &self,
        system: &str,
        turns: &[Message],
        tools: &[ToolSchema],
        screenshot: Option<&[u8]>,
    ) -> Result<Decision> {
        let step = self.step.fetch_add(1, Ordering::SeqCst);
        let body = self.build_body(system, turns, tools, screenshot, step);
        with_backoff("proxy_reasoner.decide", || self.call_once(&body), mitchell_types::retry::is_rate_limited).await
    }

    fn name(&self) -> &'static str {
        "proxy"
    }
}

fn decision_from_envelope(parsed: &Value, request_id: &str) -> Result<Decision> {
    if let Some(tokens_used) = parsed.get("tokens_used").and_then(Value::as_u64) {
        tracing::debug!(request_id, tokens_used, "proxy reasoner reported token usage");
    }

    let decision = parsed
        .get("decision")
        .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "proxy reasoner response missing decision"))?;

    match decision.get("type").and_then(Value::as_str) {
        Some("tool_call") => {
            let name = decision
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "tool_call decision missing name"))?
                .to_string();
            let arguments = decision.get("arguments").cloned().unwrap_or(Value::Null);
            Ok(Decision::ToolCall { name, arguments })
        }
        Some("text") => {
            let text = decision.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(Decision::Text(text))
        }
        other => Err(Error::new(
            ErrorKind::ReasonerProtocolError,
            format!("proxy reasoner returned unrecognized decision type {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_call_decision() {
        let parsed = json!({
            "tokens_used": 128,
            "decision": { "type": "tool_call", "name": "confirm_vehicle", "arguments": {} },
        });

        let decision = decision_from_envelope(&parsed, "req-1").unwrap();
        assert_eq!(decision, Decision::ToolCall { name: "confirm_vehicle".to_string(), arguments: json!({}) });
    }

    #[test]
    fn rejects_unrecognized_decision_type() {
        let parsed = json!({ "decision": { "type": "mystery" } });
        assert!(decision_from_envelope(&parsed, "req-1").is_err());
    }

    #[test]
    fn step_counter_advances_between_calls() {
        let reasoner = ProxyReasoner::new("http://localhost", "req-1", "shop-1");
        assert_eq!(reasoner.step.fetch_add(1, Ordering::SeqCst), 0);
        assert_eq!(reasoner.step.load(Ordering::SeqCst), 1);
    }
}
