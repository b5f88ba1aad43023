//! Tollgate - LLM chat-completion gateway service
//!
//! HTTP transport, correlation middleware, SQLite persistence and process
//! wiring around the `tollgate-llm` orchestration core.

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod middleware;
pub mod server;
pub mod store;

pub use config::AppConfig;
pub use server::{build_app, build_orchestrator, build_provider, AppState};
pub use store::SqliteStore;
