//! HTTP API gateway for Parley.
//!
//! Exposes the health check and the v1 chat API. Callers authenticate with a
//! bearer token from the configured `[[users]]`; requests without a known
//! token reach the handlers as anonymous and are refused there.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use parley_config::AppConfig;

pub use api_v1::{ApiV1State, Caller, SharedApiState};

/// Build the full router.
///
/// Layers applied:
/// - Bearer token resolution on all /v1 routes
/// - CORS with a restrictive origin policy
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState) -> Router {
    let v1 = api_v1::v1_router(state.clone())
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(HeaderValue::from_static(
            "http://localhost:8080",
        )))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let chat = Arc::new(parley_agent::build_chat_service(&config).await?);
    if config.users.iter().all(|u| u.token.is_none()) {
        warn!("No user tokens configured; every chat request will be refused");
    }

    let app = build_router(Arc::new(ApiV1State { chat, config }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve `Authorization: Bearer <token>` to a configured user.
///
/// Always attaches a [`Caller`]; an unknown token leaves it empty.
async fn auth_middleware(
    State(state): State<SharedApiState>,
    mut req: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let user = token.and_then(|t| state.config.user_for_token(t));
    if token.is_some() && user.is_none() {
        warn!("Request to /v1 API with an unknown bearer token");
    }

    req.extensions_mut().insert(Caller(user));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_v1::{ApiResponse, MessageData, ToolListResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use parley_config::UserConfig;
    use parley_core::error::ProviderError;
    use parley_core::{ModelReply, Provider, ProviderRequest, ToolCall};
    use parley_store::InMemoryStore;
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct ScriptedProvider {
        replies: Mutex<Vec<ModelReply>>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ModelReply, ProviderError> {
            self.replies.lock().unwrap().pop().ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "secret upstream detail".into(),
            })
        }
    }

    fn app(mut replies: Vec<ModelReply>) -> Router {
        replies.reverse();
        let mut config = AppConfig::default();
        config.users = vec![UserConfig {
            id: "42".into(),
            token: Some("tok-42".into()),
            display_name: "Sam Rivera".into(),
            handle: "samr".into(),
            roles: vec!["editor".into()],
        }];
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(replies),
        });
        let chat = parley_agent::assemble(&config, provider, Arc::new(InMemoryStore::new()));
        build_router(Arc::new(ApiV1State {
            chat: Arc::new(chat),
            config,
        }))
    }

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_message_round_trip() {
        let mut parameters = Map::new();
        parameters.insert("query".into(), json!("jazz"));
        let app = app(vec![
            ModelReply::calls(vec![ToolCall::new(Some("c1".into()), "search_network", parameters)]),
            ModelReply::text("<p>No jazz posts yet.</p>"),
        ]);

        let response = app
            .oneshot(post("/v1/chat/message", Some("tok-42"), json!({"message": "find jazz"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["message"], "<p>No jazz posts yet.</p>");
        assert_eq!(json["data"]["tool_calls"][0]["tool"], "search_network");
        assert_eq!(json["data"]["tool_calls"][0]["parameters"]["query"], "jazz");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_401() {
        for token in [None, Some("wrong")] {
            let response = app(vec![ModelReply::text("hi")])
                .oneshot(post("/v1/chat/message", token, json!({"message": "hello"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let json: ApiResponse<MessageData> =
                serde_json::from_value(body_json(response).await).unwrap();
            assert!(!json.success);
            assert_eq!(json.data.message, "You must be logged in to use chat.");
        }
    }

    #[tokio::test]
    async fn anonymous_request_without_body_is_401() {
        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat/message")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["message"], "You must be logged in to use chat.");
    }

    #[tokio::test]
    async fn unreadable_body_is_400_in_envelope() {
        let wrong_type = post("/v1/chat/message", Some("tok-42"), json!({"message": 5}));
        let no_content_type = Request::builder()
            .method("POST")
            .uri("/v1/chat/message")
            .header("Authorization", "Bearer tok-42")
            .body(Body::from("hello"))
            .unwrap();

        for req in [wrong_type, no_content_type] {
            let response = app(vec![]).oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            let message = json["data"]["message"].as_str().unwrap();
            assert_eq!(message, "Sorry, your message could not be read. Please try again.");
        }
    }

    #[tokio::test]
    async fn empty_message_is_400() {
        let response = app(vec![])
            .oneshot(post("/v1/chat/message", Some("tok-42"), json!({"message": "  <b></b> "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["data"]["message"], "Message cannot be empty.");
    }

    #[tokio::test]
    async fn model_failure_is_generic_500() {
        let response = app(vec![])
            .oneshot(post("/v1/chat/message", Some("tok-42"), json!({"message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        let message = json["data"]["message"].as_str().unwrap();
        assert!(message.starts_with("Sorry, I encountered an error processing your message"));
        assert!(!message.contains("secret upstream detail"));
    }

    #[tokio::test]
    async fn clear_history() {
        let response = app(vec![])
            .oneshot(post("/v1/chat/clear", Some("tok-42"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["data"]["message"],
            "Chat history cleared successfully."
        );

        let response = app(vec![])
            .oneshot(post("/v1/chat/clear", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_tools() {
        let req = Request::builder().uri("/v1/tools").body(Body::empty()).unwrap();
        let response = app(vec![]).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ToolListResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(json.count, 2);
        assert!(json.tools.iter().any(|t| t.name == "search_network"));
        assert!(json.tools.iter().any(|t| t.name == "add_link_to_page"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let big = "x".repeat(2 * 1024 * 1024);
        let response = app(vec![])
            .oneshot(post("/v1/chat/message", Some("tok-42"), json!({"message": big})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["success"], false);
    }
}
