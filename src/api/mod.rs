//! Web API module for Tollgate
//!
//! Provides:
//! - `POST /v1/chat/completions` — unary chat completion
//! - `POST /v1/chat/completions/stream` — SSE streaming chat completion
//! - `GET /health` — liveness probe

pub mod chat;
pub mod health;
pub mod problem;

use axum::Router;

pub use chat::chat_routes;
pub use health::health_routes;
pub use problem::{ApiError, ProblemDetails};

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new().merge(chat_routes()).merge(health_routes())
}
