//! Middleware for the Tollgate HTTP server

pub mod correlation;

pub use correlation::{correlation_middleware, CorrelationId};
