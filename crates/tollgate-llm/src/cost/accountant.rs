//! Accountant
//!
//! Tail of a successful pipeline: price the attempt, build the request log,
//! persist it. Every failure in here is logged and swallowed — the chat
//! response has already succeeded and stays successful.

use super::amount::CostAmount;
use super::log::{RequestLog, RequestLogSink};
use super::pricing::PricingLookup;
use crate::model::ModelId;
use crate::token::TokenCount;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prices successful attempts and persists their accounting rows
pub struct Accountant {
    pricing: Arc<dyn PricingLookup>,
    sink: Arc<dyn RequestLogSink>,
}

impl Accountant {
    /// Create an accountant over a pricing source and a log sink
    #[must_use]
    pub fn new(pricing: Arc<dyn PricingLookup>, sink: Arc<dyn RequestLogSink>) -> Self {
        Self { pricing, sink }
    }

    /// Account one successful attempt and return its estimated cost.
    ///
    /// A missing pricing row prices the request at zero; the log row is
    /// persisted either way. Pricing or sink failures degrade to a zero
    /// best-effort cost.
    #[allow(clippy::too_many_arguments)]
    pub async fn track(
        &self,
        model: &ModelId,
        input_tokens: TokenCount,
        output_tokens: TokenCount,
        provider: &str,
        response_time: Duration,
        was_fallback: bool,
    ) -> CostAmount {
        let cost = match self.pricing.pricing_for(model).await {
            Ok(Some(pricing)) => pricing.cost(input_tokens.get(), output_tokens.get()),
            Ok(None) => {
                debug!(model = %model, "No pricing row, recording zero cost");
                CostAmount::ZERO
            }
            Err(e) => {
                warn!(model = %model, error = %e, "Pricing lookup failed, recording zero cost");
                CostAmount::ZERO
            }
        };

        let log = RequestLog::new(
            model.clone(),
            input_tokens,
            output_tokens,
            cost,
            provider,
            response_time,
            was_fallback,
        );

        if let Err(e) = self.sink.save(&log).await {
            warn!(
                request_log = %log.id,
                model = %model,
                error = %e,
                "Failed to persist request log"
            );
            return CostAmount::ZERO;
        }

        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{ModelPricing, StoreError};
    use std::sync::Mutex;

    struct StaticPricing(Option<ModelPricing>);

    #[async_trait::async_trait]
    impl PricingLookup for StaticPricing {
        async fn pricing_for(
            &self,
            _model: &ModelId,
        ) -> std::result::Result<Option<ModelPricing>, StoreError> {
            Ok(self.0.clone())
        }
    }

    struct FailingPricing;

    #[async_trait::async_trait]
    impl PricingLookup for FailingPricing {
        async fn pricing_for(
            &self,
            _model: &ModelId,
        ) -> std::result::Result<Option<ModelPricing>, StoreError> {
            Err("pricing table unavailable".into())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        logs: Mutex<Vec<RequestLog>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RequestLogSink for RecordingSink {
        async fn save(&self, log: &RequestLog) -> std::result::Result<(), StoreError> {
            if self.fail {
                return Err("disk full".into());
            }
            self.logs.lock().unwrap().push(log.clone());
            Ok(())
        }
    }

    fn model() -> ModelId {
        ModelId::new("a/x").unwrap()
    }

    fn priced() -> ModelPricing {
        ModelPricing::new(model(), "1.0".parse().unwrap(), "2.0".parse().unwrap(), 128_000)
            .unwrap()
    }

    #[tokio::test]
    async fn test_track_prices_and_persists() {
        let sink = Arc::new(RecordingSink::default());
        let accountant = Accountant::new(Arc::new(StaticPricing(Some(priced()))), sink.clone());

        let cost = accountant
            .track(
                &model(),
                TokenCount::new(100),
                TokenCount::new(200),
                "a",
                Duration::from_millis(40),
                false,
            )
            .await;

        assert_eq!(cost.as_decimal(), "0.0005".parse().unwrap());
        let logs = sink.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].model_used, model());
        assert_eq!(logs[0].estimated_cost, cost);
        assert!(!logs[0].was_fallback);
    }

    #[tokio::test]
    async fn test_missing_pricing_still_persists_with_zero_cost() {
        let sink = Arc::new(RecordingSink::default());
        let accountant = Accountant::new(Arc::new(StaticPricing(None)), sink.clone());

        let cost = accountant
            .track(
                &model(),
                TokenCount::new(100),
                TokenCount::new(200),
                "a",
                Duration::from_millis(40),
                true,
            )
            .await;

        assert_eq!(cost, CostAmount::ZERO);
        let logs = sink.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].was_fallback);
    }

    #[tokio::test]
    async fn test_pricing_failure_swallowed() {
        let sink = Arc::new(RecordingSink::default());
        let accountant = Accountant::new(Arc::new(FailingPricing), sink.clone());

        let cost = accountant
            .track(
                &model(),
                TokenCount::new(1),
                TokenCount::new(1),
                "a",
                Duration::ZERO,
                false,
            )
            .await;

        assert_eq!(cost, CostAmount::ZERO);
        assert_eq!(sink.logs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_swallowed() {
        let sink = Arc::new(RecordingSink {
            logs: Mutex::new(vec![]),
            fail: true,
        });
        let accountant = Accountant::new(Arc::new(StaticPricing(Some(priced()))), sink);

        // must not panic or error; cost degrades to best-effort zero
        let cost = accountant
            .track(
                &model(),
                TokenCount::new(100),
                TokenCount::new(200),
                "a",
                Duration::ZERO,
                false,
            )
            .await;
        assert_eq!(cost, CostAmount::ZERO);
    }
}
