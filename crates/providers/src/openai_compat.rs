//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` with function calling. Non-streaming only.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::message::{Message, ToolCall};
use parley_core::provider::{ModelReply, ProviderRequest, Usage};
use parley_core::tool::FunctionSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role().as_str().into(),
                content: m.content().map(str::to_string),
                tool_calls: match m.tool_calls() {
                    [] => None,
                    calls => Some(calls.iter().map(ApiToolCall::from_call).collect()),
                },
                tool_call_id: m.tool_call_id().map(str::to_string),
            })
            .collect()
    }

    fn to_api_tools(tools: &[FunctionSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: t.clone(),
            })
            .collect()
    }

    /// Turn the first choice into a reply, decoding argument strings.
    fn to_reply(api_response: ApiResponse) -> Result<ModelReply, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ApiToolCall::into_call)
            .collect();

        Ok(ModelReply {
            content: choice.message.content,
            tool_calls,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api_response.model,
        })
    }
}

#[async_trait]
impl parley_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: api_error_message(&error_body),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Self::to_reply(api_response)
    }
}

/// Prefer `error.message` from an OpenAI error body over the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    // Serialized even when null: assistant tool-call turns carry `content: null`.
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

impl ApiToolCall {
    fn from_call(call: &ToolCall) -> Self {
        Self {
            id: Some(call.id.clone()),
            r#type: function_type(),
            function: ApiFunction {
                name: call.name.clone(),
                arguments: Value::Object(call.parameters.clone()).to_string(),
            },
        }
    }

    fn into_call(self) -> ToolCall {
        let raw = self.function.arguments.trim();
        let parameters = match serde_json::from_str::<Value>(raw) {
            _ if raw.is_empty() => Map::new(),
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(tool = %self.function.name, arguments = %other, "Tool arguments are not an object");
                Map::new()
            }
            Err(e) => {
                warn!(tool = %self.function.name, error = %e, "Unparseable tool arguments");
                Map::new()
            }
        };
        ToolCall::new(self.id, self.function.name, parameters)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: FunctionSpec,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use parley_core::Provider;
    use serde_json::json;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn tool_request_converts_with_null_content_and_string_arguments() {
        let call = ToolCall::new(
            Some("call_1".into()),
            "search_network",
            json!({"query": "jazz"}).as_object().cloned().unwrap(),
        );
        let messages = vec![
            Message::tool_request(vec![call]),
            Message::tool_result("call_1", "{}"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&messages);
        let encoded = serde_json::to_value(&api).unwrap();

        assert_eq!(encoded[0]["role"], "assistant");
        assert!(encoded[0]["content"].is_null());
        assert_eq!(encoded[0]["tool_calls"][0]["type"], "function");
        assert_eq!(
            encoded[0]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"jazz"}"#
        );
        assert_eq!(encoded[1]["tool_call_id"], "call_1");
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![FunctionSpec {
            name: "search_network".into(),
            description: "Search".into(),
            parameters: json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "search_network");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn reply_decodes_tool_calls() {
        let response: ApiResponse = serde_json::from_value(json!({
            "model": "gpt-5-mini",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "x", "arguments": "{\"q\":1}"}},
                        {"type": "function", "function": {"name": "y", "arguments": "not json"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let reply = OpenAiCompatProvider::to_reply(response).unwrap();
        assert!(reply.content.is_none());
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].parameters["q"], 1);
        assert_eq!(reply.tool_calls[1].id, "y");
        assert!(reply.tool_calls[1].parameters.is_empty());
        assert_eq!(reply.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let response: ApiResponse =
            serde_json::from_value(json!({"model": "m", "choices": []})).unwrap();
        assert!(matches!(
            OpenAiCompatProvider::to_reply(response),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
        assert_eq!(api_error_message(body), "model overloaded");
        assert_eq!(api_error_message("plain text"), "plain text");
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "gpt-5-mini".into(),
            messages: vec![Message::user("hello")],
            temperature: None,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-5-mini");
                assert!(body.get("temperature").is_none());
                Json(json!({
                    "model": "gpt-5-mini",
                    "choices": [{"message": {"role": "assistant", "content": "<p>Hi</p>"}}]
                }))
            }),
        );
        let base = serve(router).await;

        let provider = OpenAiCompatProvider::new("openai", base, "sk-test");
        let reply = provider.complete(request()).await.unwrap();
        assert_eq!(reply.content.as_deref(), Some("<p>Hi</p>"));
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let router = Router::new()
            .route("/v1/chat/completions", post(|| async { StatusCode::UNAUTHORIZED }));
        let provider = OpenAiCompatProvider::new("openai", serve(router).await, "bad");
        assert!(matches!(
            provider.complete(request()).await,
            Err(ProviderError::AuthenticationFailed(_))
        ));

        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "30")]) }),
        );
        let provider = OpenAiCompatProvider::new("openai", serve(router).await, "k");
        assert!(matches!(
            provider.complete(request()).await,
            Err(ProviderError::RateLimited { retry_after_secs: 30 })
        ));

        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let provider = OpenAiCompatProvider::new("openai", serve(router).await, "k");
        match provider.complete(request()).await {
            Err(ProviderError::ApiError { status_code, message }) => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }
}
