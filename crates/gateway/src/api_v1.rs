//! HTTP API v1 — chat endpoints for authenticated users.
//!
//! Endpoints:
//!
//! - `POST /v1/chat/message` — Send a message, get the assistant's reply
//! - `POST /v1/chat/clear`   — Clear the caller's chat history
//! - `GET  /v1/tools`        — List available tools
//!
//! Every response uses the `{success, data}` envelope. Failures carry a
//! user-facing `data.message`; details go to the server log only.

use axum::{
    Extension, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use parley_agent::{ChatReply, ChatService};
use parley_config::AppConfig;
use parley_core::{Error, UserProfile};

const GENERIC_FAILURE: &str =
    "Sorry, I encountered an error processing your message. Please try again.";
const HISTORY_FAILURE: &str = "Sorry, I encountered an error with chat history. Please try again.";
const CLEAR_FAILURE: &str = "Sorry, I encountered an error clearing chat history.";
const UNREADABLE_REQUEST: &str = "Sorry, your message could not be read. Please try again.";

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub chat: Arc<ChatService>,
    /// Users and their bearer tokens
    pub config: AppConfig,
}

pub type SharedApiState = Arc<ApiV1State>;

/// The authenticated user for a request, if any. Set by the auth middleware.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<UserProfile>);

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat/message", post(chat_message_handler))
        .route("/chat/clear", post(chat_clear_handler))
        .route("/tools", get(list_tools_handler))
        .with_state(state)
}

// ── Envelope ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageData {
    pub message: String,
}

/// A failed request: status plus the user-facing message.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Map a chat error for `/chat/message`.
    fn from_turn(e: &Error) -> Self {
        match e {
            Error::Unauthenticated | Error::EmptyInput => Self::from_input(e),
            Error::HistoryUnavailable(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, HISTORY_FAILURE),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE),
        }
    }

    /// Map a chat error for `/chat/clear`.
    fn from_clear(e: &Error) -> Self {
        match e {
            Error::Unauthenticated => Self::new(
                StatusCode::UNAUTHORIZED,
                "You must be logged in to clear chat history.",
            ),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, CLEAR_FAILURE),
        }
    }

    /// An unreadable body. Oversized bodies keep their 413.
    fn from_body(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), error = %rejection.body_text(), "Rejected chat request body");
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, UNREADABLE_REQUEST)
    }

    fn from_input(e: &Error) -> Self {
        let status = match e {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse {
                success: false,
                data: MessageData {
                    message: self.message,
                },
            }),
        )
            .into_response()
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// The caller is checked before the body, so anonymous requests get 401
/// whatever they sent.
async fn chat_message_handler(
    State(state): State<SharedApiState>,
    Extension(Caller(caller)): Extension<Caller>,
    payload: Result<Json<ChatMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatReply>>, ApiError> {
    if caller.is_none() {
        return Err(ApiError::from_turn(&Error::Unauthenticated));
    }
    let Json(payload) = payload.map_err(ApiError::from_body)?;

    info!(
        user_id = caller.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
        message_len = payload.message.len(),
        "Chat message received"
    );

    match state.chat.send_message(caller.as_ref(), &payload.message).await {
        Ok(reply) => Ok(Json(ApiResponse {
            success: true,
            data: reply,
        })),
        Err(e) => {
            if !matches!(e, Error::Unauthenticated | Error::EmptyInput) {
                error!(code = e.code(), error = %e, "Chat request failed");
            }
            Err(ApiError::from_turn(&e))
        }
    }
}

async fn chat_clear_handler(
    State(state): State<SharedApiState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<ApiResponse<MessageData>>, ApiError> {
    match state.chat.clear_history(caller.as_ref()).await {
        Ok(()) => Ok(Json(ApiResponse {
            success: true,
            data: MessageData {
                message: "Chat history cleared successfully.".into(),
            },
        })),
        Err(e) => {
            if !matches!(e, Error::Unauthenticated) {
                error!(code = e.code(), error = %e, "Clear history failed");
            }
            Err(ApiError::from_clear(&e))
        }
    }
}

// ── Tools ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDto> = state
        .chat
        .tools()
        .for_model()
        .into_iter()
        .map(|spec| ToolDto {
            name: spec.name,
            description: spec.description,
            parameters: spec.parameters,
        })
        .collect();

    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}
