//! Token counting
//!
//! The gateway estimates tokens as `chars / 4`. The estimate drives routing
//! decisions only and is never used for billing — billed counts come from
//! upstream usage metadata. Non-Latin scripts under-count with this
//! heuristic (most CJK text is closer to one token per character).

use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// Characters per estimated token
const CHARS_PER_TOKEN: usize = 4;

/// A non-negative token count
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u32);

impl TokenCount {
    /// Zero tokens
    pub const ZERO: Self = Self(0);

    /// Wrap an explicit count
    #[must_use]
    pub const fn new(count: u32) -> Self {
        Self(count)
    }

    /// Estimate the token count of a piece of text (`chars / 4`, floored)
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self((text.chars().count() / CHARS_PER_TOKEN) as u32)
    }

    /// Estimate the token count of a whole conversation
    #[must_use]
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        Self((chars / CHARS_PER_TOKEN) as u32)
    }

    /// The raw count
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Whether this count is strictly above `limit`
    #[must_use]
    pub const fn exceeds(&self, limit: u32) -> bool {
        self.0 > limit
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_floors() {
        assert_eq!(TokenCount::from_text("").get(), 0);
        assert_eq!(TokenCount::from_text("abc").get(), 0);
        assert_eq!(TokenCount::from_text("abcd").get(), 1);
        assert_eq!(TokenCount::from_text("abcdefg").get(), 1);
        assert_eq!(TokenCount::from_text("abcdefgh").get(), 2);
    }

    #[test]
    fn test_from_messages_sums_chars_before_dividing() {
        let messages = vec![
            ChatMessage::user("ab"),   // 2 chars
            ChatMessage::user("cdef"), // 4 chars
        ];
        // 6 chars total => 1 token, not 0 + 1
        assert_eq!(TokenCount::from_messages(&messages).get(), 1);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // four 3-byte chars => one token
        assert_eq!(TokenCount::from_text("こんにちは").get(), 1);
    }

    #[test]
    fn test_exceeds() {
        let count = TokenCount::new(10_001);
        assert!(count.exceeds(10_000));
        assert!(!count.exceeds(10_001));
    }

    #[test]
    fn test_add_saturates() {
        let sum = TokenCount::new(u32::MAX) + TokenCount::new(1);
        assert_eq!(sum.get(), u32::MAX);
    }
}
