//! Fallback chain
//!
//! A configured ordered sequence of models, scanned circularly after a
//! transient failure. Pure: no I/O, no state; `next` never returns a model
//! that has already been attempted.

use crate::error::{Error, Result};
use crate::model::ModelId;

/// An ordered model fallback chain
#[derive(Debug, Clone)]
pub struct FallbackChain {
    chain: Vec<ModelId>,
}

impl FallbackChain {
    /// Create a chain from an ordered model list
    #[must_use]
    pub fn new(chain: Vec<ModelId>) -> Self {
        Self { chain }
    }

    /// The configured chain
    #[must_use]
    pub fn models(&self) -> &[ModelId] {
        &self.chain
    }

    /// Chain length
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Select the next model after `failed` failed, skipping everything in
    /// `attempted`.
    ///
    /// Scans circularly starting one past the failed model's position.
    /// A failed model that is not part of the chain cannot be resolved and
    /// fails with [`Error::ModelUnknown`]; a fully-attempted chain fails
    /// with [`Error::AllProvidersFailed`].
    pub fn next(&self, failed: &ModelId, attempted: &[ModelId]) -> Result<ModelId> {
        let start = self
            .chain
            .iter()
            .position(|m| m == failed)
            .ok_or_else(|| Error::ModelUnknown(failed.to_string()))?;

        for offset in 1..=self.chain.len() {
            let candidate = &self.chain[(start + offset) % self.chain.len()];
            if !attempted.contains(candidate) {
                return Ok(candidate.clone());
            }
        }

        Err(Error::AllProvidersFailed(
            attempted.iter().map(ModelId::to_string).collect(),
        ))
    }
}
