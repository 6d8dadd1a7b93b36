//! OpenAI-compatible reasoner backend, pointed at a local or self-hosted
//! `/v1/chat/completions` endpoint (e.g. an Ollama-style server).
//!
//! This backend does not accept image input — `screenshot` is ignored, which
//! matches the text-only local models this backend targets.

use async_trait::async_trait;
use mitchell_types::{retry::with_backoff, Error, ErrorKind, Result};
use serde_json::{json, Value};

use crate::message::{Decision, Message, MessageRole, ToolSchema};
use crate::reasoner::Reasoner;

const DEFAULT_MODEL: &str = "llama3.1";

pub struct LocalReasoner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl LocalReasoner {
    /// `base_url` should point at the host serving the OpenAI-compatible
    /// API, e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat/completions", base_url.into().trim_end_matches('/')),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_body(&self, system: &str, turns: &[Message], tools: &[ToolSchema]) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": system })];
        messages.extend(turns.iter().map(|turn| {
            json!({
                "role": wire_role(turn.role),
                "content": turn.content,
            })
        }));

        let tools: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "tool_choice": "auto",
        })
    }

    async fn call_once(&self, body: &Value) -> Result<Decision> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|err| Error::with_source(ErrorKind::Http, "local reasoner request failed", Box::new(err)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::new(ErrorKind::ReasonerRateLimited, "local reasoner returned 429"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::new(
                ErrorKind::ReasonerProtocolError,
                format!("local reasoner returned status {status}: {body}"),
            ));
        }

        let parsed: Value = response.json().await.map_err(|err| {
            Error::with_source(ErrorKind::ReasonerProtocolError, "malformed local reasoner response", Box::new(err))
        })?;

        decision_from_choice(&parsed)
    }
}

#[async_trait]
impl Reasoner for LocalReasoner {
    async fn decide(
        &self,
        system: &str,
        turns: &[Message],
        tools: &[ToolSchema],
        _screenshot: Option<&[u8]>,
    ) -> Result<Decision> {
        let body = self.build_body(system, turns, tools);
        with_backoff("local_reasoner.decide", || self.call_once(&body), mitchell_types::retry::is_rate_limited).await
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn decision_from_choice(parsed: &Value) -> Result<Decision> {
    let message = parsed
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "local reasoner response missing choices[0].message"))?;

    if let Some(tool_call) = message.get("tool_calls").and_then(Value::as_array).and_then(|calls| calls.first()) {
        let function = tool_call
            .get("function")
            .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "tool_calls[0] missing function"))?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::new(ErrorKind::ReasonerProtocolError, "tool call missing name"))?
            .to_string();
        let arguments = function
            .get("arguments")
            .and_then(Value::as_str)
            .map(|raw| serde_json::from_str(raw).unwrap_or(Value::String(raw.to_string())))
            .unwrap_or(Value::Null);
        return Ok(Decision::ToolCall { name, arguments });
    }

    let text = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    Ok(Decision::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_call_with_json_encoded_arguments() {
        let parsed = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "function": { "name": "select_make", "arguments": "{\"make\":\"Honda\"}" }
                    }]
                }
            }]
        });

        let decision = decision_from_choice(&parsed).unwrap();
        assert_eq!(
            decision,
            Decision::ToolCall { name: "select_make".to_string(), arguments: json!({ "make": "Honda" }) }
        );
    }

    #[test]
    fn falls_back_to_plain_content() {
        let parsed = json!({ "choices": [{ "message": { "content": "no tool needed" } }] });
        let decision = decision_from_choice(&parsed).unwrap();
        assert_eq!(decision, Decision::Text("no tool needed".to_string()));
    }
}
