//! Model pricing
//!
//! Per-model monetary rates, expressed per million tokens for input and
//! output separately. Pricing rows are read-only from the gateway's
//! perspective and seeded externally.

use super::amount::CostAmount;
use super::StoreError;
use crate::error::{Error, Result};
use crate::model::ModelId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One million tokens, the pricing denomination
const TOKENS_PER_MILLION: u32 = 1_000_000;

/// Pricing information for a model (per 1M tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model the rates apply to
    pub model: ModelId,
    /// Provider name
    pub provider: String,
    /// Cost per 1M input tokens (USD)
    pub input_cost_per_million: Decimal,
    /// Cost per 1M output tokens (USD)
    pub output_cost_per_million: Decimal,
    /// Context window size
    pub max_context_tokens: u32,
    /// Last updated
    pub updated_at: DateTime<Utc>,
}

impl ModelPricing {
    /// Create a pricing row; prices must be non-negative and the context
    /// window positive
    pub fn new(
        model: ModelId,
        input_cost_per_million: Decimal,
        output_cost_per_million: Decimal,
        max_context_tokens: u32,
    ) -> Result<Self> {
        if input_cost_per_million.is_sign_negative() || output_cost_per_million.is_sign_negative() {
            return Err(Error::Validation(
                "pricing rates must be non-negative".to_string(),
            ));
        }
        if max_context_tokens == 0 {
            return Err(Error::Validation(
                "max context must be positive".to_string(),
            ));
        }
        let provider = model.provider().to_string();
        Ok(Self {
            model,
            provider,
            input_cost_per_million,
            output_cost_per_million,
            max_context_tokens,
            updated_at: Utc::now(),
        })
    }

    /// Calculate cost for given token counts
    #[must_use]
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> CostAmount {
        let million = Decimal::from(TOKENS_PER_MILLION);
        let input_cost = Decimal::from(input_tokens) * self.input_cost_per_million / million;
        let output_cost = Decimal::from(output_tokens) * self.output_cost_per_million / million;
        // non-negative by construction
        CostAmount::new(input_cost + output_cost).unwrap_or(CostAmount::ZERO)
    }
}

/// Read access to pricing rows
#[async_trait::async_trait]
pub trait PricingLookup: Send + Sync {
    /// Fetch the pricing row for a model, if one exists
    async fn pricing_for(
        &self,
        model: &ModelId,
    ) -> std::result::Result<Option<ModelPricing>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn pricing(input: &str, output: &str) -> ModelPricing {
        ModelPricing::new(
            ModelId::new("a/x").unwrap(),
            dec(input),
            dec(output),
            128_000,
        )
        .unwrap()
    }

    #[test]
    fn test_cost_per_million() {
        // 100 input at $1/1M + 200 output at $2/1M = $0.0005
        let p = pricing("1.0", "2.0");
        assert_eq!(p.cost(100, 200).as_decimal(), dec("0.0005"));
    }

    #[test]
    fn test_zero_tokens_cost_nothing() {
        let p = pricing("3.0", "15.0");
        assert_eq!(p.cost(0, 0), CostAmount::ZERO);
    }

    #[test]
    fn test_provider_derived_from_model() {
        let p = pricing("1.0", "1.0");
        assert_eq!(p.provider, "a");
    }

    #[test]
    fn test_negative_rate_rejected() {
        let result = ModelPricing::new(
            ModelId::new("a/x").unwrap(),
            dec("-1.0"),
            dec("1.0"),
            1000,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_context_rejected() {
        let result =
            ModelPricing::new(ModelId::new("a/x").unwrap(), dec("1.0"), dec("1.0"), 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_cost_rounded_to_six_places() {
        // 1 input token at $1.50/1M = 0.0000015, a tie at 6 dp; half-to-even
        // lands on 0.000002
        let p = pricing("1.5", "0.0");
        assert_eq!(p.cost(1, 0).as_decimal(), dec("0.000002"));
    }
}
