//! OpenAI-compatible provider implementation.
//!
//! Works with Ollama's `/v1/chat/completions` endpoint and anything else that
//! speaks the same dialect (llama.cpp server, vLLM, LM Studio).
//!
//! Prior turns are not sent as individual chat messages. They are rendered
//! into one assistant message (`User: ...\nAssistant: ...\n`) placed between
//! the system prompt and the new user prompt.

use askollama_core::error::ProviderError;
use askollama_core::provider::*;
use askollama_core::turn::{Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Ollama's OpenAI-compatible endpoint on its default port.
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434/v1";

/// An OpenAI-compatible chat backend.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or(OLLAMA_DEFAULT_URL),
            "ollama", // Ollama ignores the key
            Duration::from_secs(300),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Flatten prior turns into the transcript carried by the assistant message.
    pub fn render_context(context: &[Turn]) -> String {
        let mut rendered = String::new();
        for turn in context {
            let label = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            rendered.push_str(label);
            rendered.push_str(": ");
            rendered.push_str(&turn.content);
            rendered.push('\n');
        }
        rendered
    }

    /// System prompt, rendered context, user prompt.
    fn to_api_messages(request: &ProviderRequest) -> Vec<ApiMessage> {
        vec![
            ApiMessage {
                role: "system".into(),
                content: request.system_prompt.clone(),
            },
            ApiMessage {
                role: "assistant".into(),
                content: Self::render_context(&request.context),
            },
            ApiMessage {
                role: "user".into(),
                content: request.prompt.clone(),
            },
        ]
    }

    fn to_api_request(request: &ProviderRequest) -> ApiRequest {
        ApiRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::to_api_request(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            context_turns = request.context.len(),
            max_tokens = ?request.max_tokens,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        parse_response(api_response, &request.model)
    }
}

fn parse_response(
    api_response: ApiResponse,
    requested_model: &str,
) -> Result<ProviderResponse, ProviderError> {
    if let Some(error) = api_response.error {
        return Err(ProviderError::ApiError {
            status_code: 200,
            message: error.message,
        });
    }

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        text: choice.message.content.unwrap_or_default(),
        usage,
        model: api_response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ApiReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use askollama_core::turn::ConversationId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn request(context: Vec<Turn>) -> ProviderRequest {
        ProviderRequest {
            model: "llama3.2".into(),
            system_prompt: "Be brief.".into(),
            context,
            prompt: "And then?".into(),
            max_tokens: Some(32768),
            temperature: 0.7,
        }
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider =
            OpenAiCompatProvider::new("x", "http://host:1/v1/", "", Duration::from_secs(1))
                .unwrap();
        assert_eq!(provider.base_url(), "http://host:1/v1");
    }

    #[test]
    fn context_rendered_as_transcript() {
        let id = ConversationId(1);
        let context = vec![
            Turn::user("Hello", id),
            Turn::assistant("Hi there!", "llama3", id),
        ];
        assert_eq!(
            OpenAiCompatProvider::render_context(&context),
            "User: Hello\nAssistant: Hi there!\n"
        );
        assert_eq!(OpenAiCompatProvider::render_context(&[]), "");
    }

    #[test]
    fn message_layout_is_system_assistant_user() {
        let id = ConversationId(3);
        let req = request(vec![Turn::user("Q", id), Turn::assistant("A", "m", id)]);
        let messages = OpenAiCompatProvider::to_api_messages(&req);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "assistant", "user"]);
        assert_eq!(messages[0].content, "Be brief.");
        assert_eq!(messages[1].content, "User: Q\nAssistant: A\n");
        assert_eq!(messages[2].content, "And then?");
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(OpenAiCompatProvider::to_api_request(&request(vec![])))
            .unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["max_tokens"], 32768);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);

        let mut req = request(vec![]);
        req.max_tokens = None;
        let body = serde_json::to_value(OpenAiCompatProvider::to_api_request(&req)).unwrap();
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_completion_with_usage() {
        let data = r#"{
            "model": "llama3.2",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Four."}}],
            "usage": {"prompt_tokens": 31, "completion_tokens": 2, "total_tokens": 33}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = parse_response(parsed, "ignored").unwrap();
        assert_eq!(resp.text, "Four.");
        assert_eq!(resp.model, "llama3.2");
        assert_eq!(resp.input_tokens(), 31);
        assert_eq!(resp.output_tokens(), 2);
    }

    #[test]
    fn parse_completion_without_usage() {
        let data = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = parse_response(parsed, "qwen2").unwrap();
        assert_eq!(resp.model, "qwen2");
        assert_eq!(resp.input_tokens(), 0);
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parse_response(parsed, "m"),
            Err(ProviderError::ApiError { status_code: 200, .. })
        ));
    }

    #[test]
    fn error_body_is_surfaced() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"error": {"message": "model is loading"}}"#).unwrap();
        match parse_response(parsed, "m") {
            Err(ProviderError::ApiError { message, .. }) => assert_eq!(message, "model is loading"),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    /// Serve exactly one canned HTTP response on a random local port.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let url = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"model":"llama3.2","choices":[{"message":{"content":"pong"}}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        )
        .await;
        let provider = OpenAiCompatProvider::new("ollama", url, "", Duration::from_secs(5)).unwrap();
        let resp = provider.complete(request(vec![])).await.unwrap();
        assert_eq!(resp.text, "pong");
        assert_eq!(resp.output_tokens(), 1);
    }

    #[tokio::test]
    async fn unknown_model_maps_to_model_not_found() {
        let url = one_shot_server("HTTP/1.1 404 Not Found", r#"{"error":{"message":"no such model"}}"#).await;
        let provider = OpenAiCompatProvider::new("ollama", url, "", Duration::from_secs(5)).unwrap();
        let err = provider.complete(request(vec![])).await.unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound(m) if m == "llama3.2"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let provider = OpenAiCompatProvider::new(
            "ollama",
            format!("http://{addr}/v1"),
            "",
            Duration::from_secs(5),
        )
        .unwrap();
        let err = provider.complete(request(vec![])).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
