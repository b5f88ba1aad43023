//! Cost accounting
//!
//! Pricing lookup, cost derivation and request-log persistence. Accounting
//! runs at the tail of a successful pipeline and must never turn a
//! successful chat response into a client-visible error.

mod accountant;
mod amount;
mod log;
mod pricing;

pub use accountant::Accountant;
pub use amount::CostAmount;
pub use log::{RequestLog, RequestLogSink};
pub use pricing::{ModelPricing, PricingLookup};

/// Error type produced by pricing/log-sink implementations.
///
/// Deliberately opaque: the accountant only ever logs and swallows it.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
