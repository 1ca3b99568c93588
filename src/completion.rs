use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::CompletionConfig;
use crate::tool_registry::wire_catalog;
use crate::types::{ChatMessage, ToolSpec};

/// The completion service as a black box: one transcript in, one assistant
/// message out. The seam exists so the orchestration loop can run against
/// scripted clients in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .context("failed building completion HTTP client")?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_request_body(&self.config, messages, tools);
        debug!(model = %self.config.model, messages = messages.len(), "requesting completion");

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("completion request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("completion service returned {status}: {detail}");
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("failed decoding completion response body")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("completion response contained no choices")?;
        Ok(choice.message)
    }
}

fn build_request_body(
    config: &CompletionConfig,
    messages: &[ChatMessage],
    tools: &[ToolSpec],
) -> Value {
    json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": messages,
        "tools": wire_catalog(tools),
        "tool_choice": "auto"
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::CompletionConfig;
    use crate::tool_registry::registry;
    use crate::types::{ChatMessage, Role};

    use super::{build_request_body, ChatCompletionResponse};

    #[test]
    fn request_body_carries_transcript_tools_and_auto_choice() {
        let config = CompletionConfig::default();
        let messages = vec![
            ChatMessage::system("You are an assistant."),
            ChatMessage::user("list the repo"),
        ];
        let body = build_request_body(&config, &messages, &registry());

        assert_eq!(body["model"], config.model);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"].as_array().expect("messages").len(), 2);
        assert_eq!(body["tools"].as_array().expect("tools").len(), 6);
        assert_eq!(body["messages"][1]["content"], "list the repo");
    }

    #[test]
    fn response_with_tool_calls_decodes_into_assistant_message() {
        let raw = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": { "name": "list_files", "arguments": "{\"path\":\".\"}" }
                    }]
                }
            }]
        });
        let parsed: ChatCompletionResponse =
            serde_json::from_value(raw).expect("decode response");
        let message = &parsed.choices[0].message;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.requested_tool_calls()[0].function.name, "list_files");
    }
}
