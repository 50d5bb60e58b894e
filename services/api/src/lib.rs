//! HTTP proxy in front of the chat-completions API.
//!
//! Clients post the whole conversation to `POST /api/ask` and get the upstream
//! payload back untouched. The API key only ever lives in this process.

pub mod config;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use interview_core::gateway::{AskRequest, GatewayError, OpenAiClient};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    client: Arc<OpenAiClient>,
}

impl AppState {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Builds the proxy router with a permissive CORS policy.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ask", post(ask).fallback(only_post))
        .layer(cors)
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

async fn only_post() -> (StatusCode, Json<Value>) {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "Only POST allowed")
}

async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!("Rejected /api/ask body: {}", rejection.body_text());
            return error_body(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    tracing::debug!(turns = request.messages.len(), "forwarding conversation");
    match state.client.forward(&request.messages).await {
        Ok(data) => (StatusCode::OK, Json(data)),
        Err(e) => failure(e),
    }
}

fn failure(err: GatewayError) -> (StatusCode, Json<Value>) {
    match err {
        GatewayError::Upstream { status, message } => error_body(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            message,
        ),
        GatewayError::Configuration(message) => {
            tracing::error!("{}", message);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        other => {
            tracing::error!("Handler error: {}", other);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
