//! Inbound request and outbound response types

use crate::cost::CostAmount;
use crate::error::{Error, Result};
use crate::message::ChatMessage;
use crate::model::ModelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest accepted sampling temperature
const MIN_TEMPERATURE: f32 = 0.0;
/// Highest accepted sampling temperature
const MAX_TEMPERATURE: f32 = 2.0;

/// An inbound chat-completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered conversation messages
    pub messages: Vec<ChatMessage>,
    /// Requested model; `None` lets the router decide
    pub model: Option<String>,
    /// Sampling temperature in [0, 2]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a request from messages
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Set the requested model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the generation cap
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Validate the request shape.
    ///
    /// Rejects empty conversations, empty message content, temperatures
    /// outside [0, 2] and a zero generation cap. Runs before any upstream
    /// call is issued.
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        if self
            .messages
            .iter()
            .any(|m| m.content.trim().is_empty())
        {
            return Err(Error::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
                return Err(Error::Validation(format!(
                    "temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {temperature}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(Error::Validation(
                "max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The user-requested model, ignoring blank strings
    #[must_use]
    pub fn requested_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// A completed chat response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated content
    pub content: String,
    /// Model that produced the content
    pub model: ModelId,
    /// Input + output tokens of the successful attempt
    pub tokens_used: u32,
    /// Estimated cost of the successful attempt
    pub estimated_cost: CostAmount,
    /// Wall-clock time from routing to success
    pub response_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("hello")])
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_messages_rejected() {
        let request = ChatRequest::new(vec![]);
        assert!(matches!(
            request.validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_empty_content_rejected() {
        let request = ChatRequest::new(vec![ChatMessage::user("  ")]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(valid_request().with_temperature(0.0).validate().is_ok());
        assert!(valid_request().with_temperature(2.0).validate().is_ok());
        assert!(valid_request().with_temperature(3.0).validate().is_err());
        assert!(valid_request().with_temperature(-0.1).validate().is_err());
    }

    #[test]
    fn test_zero_max_tokens_rejected() {
        assert!(valid_request().with_max_tokens(0).validate().is_err());
        assert!(valid_request().with_max_tokens(1).validate().is_ok());
    }

    #[test]
    fn test_requested_model_ignores_blank() {
        assert_eq!(valid_request().requested_model(), None);
        assert_eq!(valid_request().with_model("  ").requested_model(), None);
        assert_eq!(
            valid_request().with_model("a/x").requested_model(),
            Some("a/x")
        );
    }
}
