//! Request logs
//!
//! One immutable accounting row per successful request: which model
//! answered, how many tokens it consumed, what that cost, how long it took
//! and whether fallback was involved.

use super::amount::CostAmount;
use crate::model::ModelId;
use crate::token::TokenCount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One persisted accounting record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    /// Record id, generated at creation
    pub id: Uuid,
    /// Creation instant (UTC)
    pub timestamp: DateTime<Utc>,
    /// Model that produced the successful attempt
    pub model_used: ModelId,
    /// Billed input tokens
    pub input_tokens: TokenCount,
    /// Billed output tokens
    pub output_tokens: TokenCount,
    /// Estimated cost in USD
    pub estimated_cost: CostAmount,
    /// Provider name (display/grouping)
    pub provider_name: String,
    /// Wall-clock latency of the whole orchestration
    pub response_time: Duration,
    /// Whether the success came from a fallback attempt
    pub was_fallback: bool,
}

impl RequestLog {
    /// Create a record with a fresh id and the current UTC timestamp
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model_used: ModelId,
        input_tokens: TokenCount,
        output_tokens: TokenCount,
        estimated_cost: CostAmount,
        provider_name: impl Into<String>,
        response_time: Duration,
        was_fallback: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model_used,
            input_tokens,
            output_tokens,
            estimated_cost,
            provider_name: provider_name.into(),
            response_time,
            was_fallback,
        }
    }
}

/// Write access to the request-log store
#[async_trait::async_trait]
pub trait RequestLogSink: Send + Sync {
    /// Persist one record; concurrent writes are expected
    async fn save(&self, log: &RequestLog) -> std::result::Result<(), super::StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_id_per_record() {
        let make = || {
            RequestLog::new(
                ModelId::new("a/x").unwrap(),
                TokenCount::new(10),
                TokenCount::new(20),
                CostAmount::ZERO,
                "a",
                Duration::from_millis(5),
                false,
            )
        };
        assert_ne!(make().id, make().id);
    }

    #[test]
    fn test_timestamp_is_recent() {
        let log = RequestLog::new(
            ModelId::new("a/x").unwrap(),
            TokenCount::ZERO,
            TokenCount::ZERO,
            CostAmount::ZERO,
            "a",
            Duration::ZERO,
            true,
        );
        let age = Utc::now() - log.timestamp;
        assert!(age.num_seconds() < 5);
    }
}
