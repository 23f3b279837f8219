//! OpenRouter chat-completions client implementing [`TextGenerator`].
//!
//! Any OpenAI-compatible endpoint works: the client posts to
//! `<base_url>/chat/completions` with bearer auth and returns the first
//! choice. It makes exactly one request per call and never retries.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use rfpscope_core::{ChatCompletion, RawGenerationOutput, RenderedPrompt, TextGenerator};
use rfpscope_shared::{AnalysisError, OpenRouterConfig, Result, RfpScopeError};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("rfpscope/", env!("CARGO_PKG_VERSION"));

/// Maximum number of error-body bytes kept in an error message.
const MAX_ERROR_BODY: usize = 500;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn messages(prompt: &RenderedPrompt) -> Vec<ChatMessage<'_>> {
    match prompt {
        RenderedPrompt::Text(text) => vec![ChatMessage {
            role: "user",
            content: text,
        }],
        RenderedPrompt::Chat { system, user } => vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenRouter (or any compatible API).
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterClient {
    /// Build a client from the `[openrouter]` config section.
    pub fn new(config: &OpenRouterConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = completions_url(&config.base_url)?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RfpScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            model: config.default_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Override the model ID.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(
        &self,
        prompt: &RenderedPrompt,
    ) -> std::result::Result<RawGenerationOutput, AnalysisError> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages(prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header("X-Title", "rfpscope")
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::generation(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(%status, "provider returned an error status");
            return Err(AnalysisError::generation(format!(
                "HTTP {status}: {}",
                truncate(&text, MAX_ERROR_BODY)
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::generation(format!("invalid response body: {e}")))?;

        let (tokens_in, tokens_out) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        debug!(tokens_in, tokens_out, "completion received");

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::generation("response has no choices"))?;

        Ok(match choice.message.content {
            Value::String(content) => RawGenerationOutput::Completion(ChatCompletion {
                content,
                model: parsed.model.unwrap_or_else(|| self.model.clone()),
                tokens_in,
                tokens_out,
            }),
            // Content-part arrays are joined by the normalizer.
            parts if has_text_part(&parts) => {
                RawGenerationOutput::Json(serde_json::json!({ "content": parts }))
            }
            _ => {
                warn!(tokens_out, "completion carried no text content");
                return Err(AnalysisError::generation("response has no text content"));
            }
        })
    }
}

impl TextGenerator for OpenRouterClient {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
    ) -> std::result::Result<RawGenerationOutput, AnalysisError> {
        self.complete(prompt).await
    }
}

/// `<base>/chat/completions`, tolerating a base with or without a trailing slash.
fn completions_url(base: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&base)
        .and_then(|u| u.join("chat/completions"))
        .map_err(|e| RfpScopeError::config(format!("invalid base_url '{base}': {e}")))
}

/// True for a content-part array with at least one text part. Null content
/// (content filter, token limit) has none.
fn has_text_part(content: &Value) -> bool {
    content.as_array().is_some_and(|parts| {
        parts
            .iter()
            .any(|p| p.is_string() || p.get("text").is_some_and(Value::is_string))
    })
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use rfpscope_core::normalize::response_text;
    use rfpscope_core::{AnalysisRequest, Analyzer, SilentProgress, TaskRegistry};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        let config = OpenRouterConfig {
            base_url: format!("{}/api/v1", server.uri()),
            ..Default::default()
        };
        OpenRouterClient::new(&config, "test-key").unwrap()
    }

    fn completion_body(content: Value) -> Value {
        json!({
            "id": "gen-1",
            "model": "google/gemini-flash-1.5",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 40}
        })
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("https://openrouter.ai/api/v1").unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://openrouter.ai/api/v1/").unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert!(completions_url("not a url").is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é");
    }

    #[tokio::test]
    async fn test_text_prompt_is_sent_as_user_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "google/gemini-flash-1.5",
                "messages": [{"role": "user", "content": "Identify risks"}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(json!("{\"risk\": {}}"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let out = client
            .generate(&RenderedPrompt::Text("Identify risks".into()))
            .await
            .unwrap();

        match out {
            RawGenerationOutput::Completion(c) => {
                assert_eq!(c.content, "{\"risk\": {}}");
                assert_eq!(c.model, "google/gemini-flash-1.5");
                assert_eq!(c.tokens_in, 120);
                assert_eq!(c.tokens_out, 40);
            }
            other => panic!("expected Completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_prompt_sends_system_and_user() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": "Extract JSON"},
                    {"role": "user", "content": "Widget, $10"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!("{}"))))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).with_model("meta-llama/llama-3.3-70b-instruct");
        assert_eq!(client.model(), "meta-llama/llama-3.3-70b-instruct");
        client
            .generate(&RenderedPrompt::Chat {
                system: "Extract JSON".into(),
                user: "Widget, $10".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_becomes_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap_err();
        match err {
            AnalysisError::Generation { message } => {
                assert!(message.contains("429"), "{message}");
                assert!(message.contains("rate limited"), "{message}");
            }
            other => panic!("expected Generation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_choices_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"error": {"message": "upstream overloaded"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::generation("response has no choices"));
    }

    #[tokio::test]
    async fn test_content_parts_are_left_for_normalizer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!([
                {"type": "text", "text": "{\"eligibility\": "},
                {"type": "text", "text": "{}}"}
            ]))))
            .mount(&server)
            .await;

        let out = client_for(&server)
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap();
        assert!(matches!(out, RawGenerationOutput::Json(_)));
        assert_eq!(response_text(out), "{\"eligibility\": {}}");
    }

    #[tokio::test]
    async fn test_null_content_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(Value::Null)))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::generation("response has no text content"));
    }

    #[tokio::test]
    async fn test_null_content_fails_the_task() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": null}}]})),
            )
            .mount(&server)
            .await;

        let registry = TaskRegistry::builtin();
        let risk = registry.get("risk").unwrap().clone();
        let analyzer = Analyzer::new(client_for(&server))
            .with_registry(TaskRegistry::from_specs(vec![risk]).unwrap());
        let result = analyzer
            .analyze(&AnalysisRequest::new("company", "rfp"), &SilentProgress)
            .await;

        assert_eq!(
            result.error(),
            Some("risk analysis failed: generation failed: response has no text content")
        );
    }

    #[tokio::test]
    async fn test_parts_without_text_are_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!([
                {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}}
            ]))))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::generation("response has no text content"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_error() {
        let config = OpenRouterConfig {
            base_url: "http://127.0.0.1:9/api/v1".into(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let client = OpenRouterClient::new(&config, "k").unwrap();
        let err = client
            .generate(&RenderedPrompt::Text("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Generation { .. }));
    }
}
