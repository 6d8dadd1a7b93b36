//! Hosted vision-capable reasoner backend: Google's Gemini `generateContent`
//! API.
//!
//! Speaks Gemini's wire shape directly (grounded in
//! `examples/original_source/addons/mitchell_agent/agent/navigator.py`'s
//! `call_gemini`): a `systemInstruction` object, a `contents` array of
//! `{role, parts}` turns (`"model"` rather than `"assistant"` for the
//! reasoner's own turns), a `tools: [{function_declarations}]` array, and
//! `tool_config.function_calling_config.mode = "ANY"` to force a function
//! call. The response's tool call lives at
//! `candidates[0].content.parts[].functionCall`.

use async_trait::async_trait;
use mitchell_types::{retry::with_backoff, Error, ErrorKind, Result};
use serde_json::{json, Value};

use crate::message::{encode_screenshot, Decision, Message, MessageRole, ToolSchema};
use crate::reasoner::Reasoner;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct CloudReasoner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CloudReasoner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent?key={}", self.base_url, self.model, self.api_key)
    }

    fn build_body(&self, system: &str, turns: &[Message], tools: &[ToolSchema], screenshot: Option<&[u8]>) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let last_index = turns.len().saturating_sub(1);

        for (i, turn) in turns.iter().enumerate() {
            if turn.role == MessageRole::System {
                // Folded into systemInstruction below instead of a content turn.
                continue;
            }

            let mut parts = vec![json!({ "text": turn.content })];
            if turn.role == MessageRole::User && i == last_index && let Some(bytes) = screenshot {
                parts.push(json!({
                    "inline_data": { "mime_type": "image/png", "data": encode_screenshot(bytes) },
                }));
            }

            contents.push(json!({ "role": wire_role(turn.role), "parts": parts }));
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();

        json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": contents,
            "tools": [{ "function_declarations": function_declarations }],
            "tool_config": { "function_calling_config": { "mode": "ANY" } },
            "generation_config": { "temperature": 0.0 },
        })
    }

    async fn call_once(&self, body: &Value) -> Result<Decision> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|err| Error::with_source(ErrorKind::Http, "cloud reasoner request failed", Box::new(err)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::new(ErrorKind::ReasonerRateLimited, "cloud reasoner returned 429"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::new(
                ErrorKind::ReasonerProtocolError,
                format!("cloud reasoner returned status {status}: {body}"),
            ));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|err| {
                Error::with_source(ErrorKind::ReasonerProtocolError, "malformed cloud reasoner response", Box::new(err))
            })?;

        decision_from_candidates(&parsed)
    }
}

#[async_trait]
impl Reasoner for CloudReasoner {
    async fn decide(
        &self,
        system: &str,
        turns: &[Message],
        tools: &[ToolSchema],
        screenshot: Option<&[u8]>,
    ) -> Result<Decision> {
        let body = self.build_body(system, turns, tools, screenshot);
        with_backoff("cloud_reasoner.decide", || self.call_once(&body), mitchell_types::retry::is_rate_limited).await
    }

    fn name(&self) -> &'static str {
        "cloud"
    }
}

/// Gemini uses `"model"` rather than `"assistant"` for the reasoner's own
/// turns; `System` turns never reach this function (folded into
/// `systemInstruction` by `build_body`).
fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System | MessageRole::User => "user",
        MessageRole::Assistant => "model",
    }
}

fn decision_from_candidates(parsed: &Value) -> Result<Decision> {
    let candidates = parsed
        .get("candidates")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "cloud reasoner response missing candidates"))?;

    let Some(first) = candidates.first() else {
        return Ok(Decision::Text("no response from cloud reasoner".to_string()));
    };

    let parts = first
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for part in &parts {
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "functionCall missing name"))?
                .to_string();
            let arguments = call.get("args").cloned().unwrap_or(Value::Null);
            return Ok(Decision::ToolCall { name, arguments });
        }
    }

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Decision::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tool_call_from_candidates() {
        let parsed = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "thinking..." },
                        { "functionCall": { "name": "select_year", "args": { "year": "2019" } } },
                    ]
                }
            }]
        });

        let decision = decision_from_candidates(&parsed).unwrap();
        assert_eq!(
            decision,
            Decision::ToolCall { name: "select_year".to_string(), arguments: json!({ "year": "2019" }) }
        );
    }

    #[test]
    fn falls_back_to_joined_text_parts() {
        let parsed = json!({ "candidates": [{ "content": { "parts": [{ "text": "hello" }] } }] });
        let decision = decision_from_candidates(&parsed).unwrap();
        assert_eq!(decision, Decision::Text("hello".to_string()));
    }

    #[test]
    fn no_candidates_yields_text_fallback_instead_of_error() {
        let parsed = json!({ "candidates": [] });
        let decision = decision_from_candidates(&parsed).unwrap();
        assert_eq!(decision, Decision::Text("no response from cloud reasoner".to_string()));
    }

    #[test]
    fn build_body_folds_system_role_into_system_instruction() {
        let reasoner = CloudReasoner::new("test-key");
        let turns = vec![Message { role: MessageRole::User, content: "find a 2018 F-150".to_string() }];
        let body = reasoner.build_body("You are a vehicle selector.", &turns, &[], None);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a vehicle selector.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
    }
}
