use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;

/// System message pinning the model to a source-faithful analyst role.
pub const SYSTEM_PERSONA: &str = "你是一位顶级的商业分析师和投资银行家，极其擅长从商业计划书、信息备忘录等文档中提炼和构建结构化的深度分析报告。你的分析必须严格基于原文，逻辑严谨，格式清晰，绝对禁止杜撰任何信息。";

const CONTENT_FILTER: &str = "content_filter";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("AI analysis failed: the content triggered the provider's safety policy")]
    ContentFiltered,

    #[error("AI call succeeded but returned no usable content (finish reason: {finish_reason})")]
    EmptyContent { finish_reason: String },

    #[error("Request failed: {status} - {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Exception while calling the AI API: {0}")]
    Transport(String),
}

/// One model call: model name, the composed prompt, and the caller's key.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the reply with Markdown code fences removed.
    async fn complete(&self, model: &str, prompt: &str, api_key: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error envelope: OpenAI-style `{"error": {...}}` or DashScope's flat
/// `{"code", "message"}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorEnvelope {
    fn describe(self, fallback: &str) -> String {
        let (code, message) = match self.error {
            Some(body) => (
                body.code.map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
                body.message,
            ),
            None => (self.code, self.message),
        };

        match (code, message) {
            (Some(code), Some(message)) => format!("{} - {}", code, message),
            (None, Some(message)) => message,
            (Some(code), None) => code,
            (None, None) => fallback.to_string(),
        }
    }
}

pub fn build_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: SYSTEM_PERSONA.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        },
    ]
}

/// Trims the reply and removes every ```json / ``` fence marker.
pub fn strip_code_fences(content: &str) -> String {
    content
        .trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpCompletionClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds));

        builder = match &config.proxy {
            Some(proxy) => builder.proxy(
                reqwest::Proxy::all(proxy.as_str())
                    .with_context(|| format!("Invalid LLM_PROXY: {}", proxy))?,
            ),
            None if config.use_system_proxy => builder,
            None => builder.no_proxy(),
        };

        let client = builder.build().context("Failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base_url)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, model: &str, prompt: &str, api_key: &str) -> Result<String, LlmError> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model,
            messages: build_messages(prompt),
        };

        debug!(model = model, prompt_chars = prompt.chars().count(), "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            let fallback = status.canonical_reason().unwrap_or("unknown error");
            let message = envelope.describe(fallback);
            warn!(status = status.as_u16(), error = %message, "Completion request rejected");
            return Err(LlmError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Transport(format!("malformed completion response: {}", e)))?;

        let choice = parsed.choices.into_iter().next();
        let finish_reason = choice
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "unknown".to_string());

        if finish_reason == CONTENT_FILTER {
            warn!(model = model, "Completion blocked by content filter");
            return Err(LlmError::ContentFiltered);
        }

        let content = choice
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                finish_reason: finish_reason.clone(),
            })?;

        info!(
            model = model,
            finish_reason = %finish_reason,
            reply_chars = content.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );

        Ok(strip_code_fences(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpCompletionClient {
        HttpCompletionClient::new(&LlmConfig {
            model: "qwen-max-longcontext".to_string(),
            api_base_url: format!("{}/v1/", server.uri()),
            proxy: None,
            use_system_proxy: false,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn completion(content: serde_json::Value, finish_reason: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": finish_reason
            }]
        })
    }

    #[test]
    fn fences_are_removed() {
        assert_eq!(strip_code_fences("  ```json\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("plain"), "plain");
    }

    #[test]
    fn messages_carry_persona_then_prompt() {
        let messages = build_messages("分析这份文件");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_PERSONA);
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "分析这份文件");
    }

    #[tokio::test]
    async fn successful_reply_is_unfenced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "qwen-max-longcontext" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                json!("```json\n{\"name\": \"星河科技\"}\n```"),
                "stop",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete("qwen-max-longcontext", "prompt", "sk-test")
            .await
            .unwrap();
        assert_eq!(reply, "{\"name\": \"星河科技\"}");
    }

    #[tokio::test]
    async fn content_filter_is_a_distinct_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("partial"), "content_filter")))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete("qwen-max-longcontext", "prompt", "sk-test")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ContentFiltered));
    }

    #[tokio::test]
    async fn empty_content_reports_finish_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!(null), "length")))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete("qwen-max-longcontext", "prompt", "sk-test")
            .await
            .unwrap_err();
        match err {
            LlmError::EmptyContent { finish_reason } => assert_eq!(finish_reason, "length"),
            other => panic!("expected EmptyContent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_errors_carry_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": "invalid_api_key", "message": "Incorrect API key provided." }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete("qwen-max-longcontext", "prompt", "bad-key")
            .await
            .unwrap_err();
        match err {
            LlmError::RequestFailed { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid_api_key - Incorrect API key provided.");
            }
            other => panic!("expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_raised() {
        let client = HttpCompletionClient::new(&LlmConfig {
            model: "m".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            proxy: None,
            use_system_proxy: false,
            timeout_seconds: 2,
        })
        .unwrap();

        let err = client.complete("m", "prompt", "key").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }

    #[test]
    fn invalid_proxy_is_a_startup_error() {
        let result = HttpCompletionClient::new(&LlmConfig {
            model: "m".to_string(),
            api_base_url: "http://localhost".to_string(),
            proxy: Some("not a url".to_string()),
            use_system_proxy: true,
            timeout_seconds: 2,
        });
        assert!(result.is_err());
    }
}
