use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::prompt::{build_system_prompt, BookingContext};
use crate::provider::{event_channel, LlmAdapter, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::stream::LlmStreamEvent;
use crate::types::{ContentBlock, HistoryMessage, HistoryRole, ToolDefinition};

const API_VERSION: &str = "2023-06-01";

/// LLM adapter (C9) backed by Anthropic's streaming `/v1/messages` endpoint.
pub struct AnthropicLlmAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicLlmAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmAdapter for AnthropicLlmAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_stream(
        &self,
        history: &[HistoryMessage],
        context: &BookingContext,
        tools: &[ToolDefinition],
    ) -> Result<ReceiverStream<LlmStreamEvent>> {
        let now_local = chrono_now_rfc3339();
        let system = build_system_prompt(context, now_local);
        let body = build_request_body(&self.model, history, &system, tools);

        debug!(model = %self.model, "sending streaming request to Anthropic");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(LlmError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "Anthropic streaming API error");
            return Err(LlmError::Api { status, message });
        }

        let (tx, stream) = event_channel();
        tokio::spawn(crate::anthropic_stream::process_stream(resp, tx));
        Ok(stream)
    }
}

fn build_request_body(
    model: &str,
    history: &[HistoryMessage],
    system: &crate::prompt::SystemPrompt,
    tools: &[ToolDefinition],
) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = history.iter().map(history_message_to_wire).collect();

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "temperature": TEMPERATURE,
        "system": system.to_anthropic_blocks(),
        "messages": messages,
        "stream": true,
    });

    if !tools.is_empty() {
        let tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    body
}

/// `Tool` history entries are a wire-level fiction: Anthropic only knows
/// `user`/`assistant` roles, with tool results carried as `tool_result`
/// content blocks inside a `user` turn.
fn history_message_to_wire(msg: &HistoryMessage) -> serde_json::Value {
    let role = match msg.role {
        HistoryRole::User | HistoryRole::Tool => "user",
        HistoryRole::Assistant => "assistant",
    };

    let content: Vec<serde_json::Value> = msg
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => serde_json::json!({ "type": "text", "text": text }),
            ContentBlock::ToolUse { id, name, input } => serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }),
            ContentBlock::ToolResult { tool_use_id, content, is_error } => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
        })
        .collect();

    serde_json::json!({ "role": role, "content": content })
}

fn chrono_now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::build_system_prompt;

    #[test]
    fn tool_history_role_serializes_as_user() {
        let msg = HistoryMessage::tool_result("call_1", "ok", false);
        let wire = history_message_to_wire(&msg);
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"][0]["type"], "tool_result");
    }

    #[test]
    fn request_body_carries_fixed_temperature_and_max_tokens() {
        let context = BookingContext {
            business_name: "Acme Dental".to_string(),
            timezone: "America/New_York".to_string(),
        };
        let system = build_system_prompt(&context, "2026-01-19T10:00:00-05:00");
        let body = build_request_body("claude-3-5-sonnet-20241022", &[], &system, &[]);
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["stream"], true);
    }
}
