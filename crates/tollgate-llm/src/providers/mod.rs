//! Chat-completion provider implementations

mod mock;
mod openai_compat;

pub use mock::MockProvider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
