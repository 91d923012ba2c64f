//! Provider specific [`LLMProvider`](crate::provider::LLMProvider) implementations.
//!
//! Each submodule offers a concrete adapter that speaks a particular vendor's
//! API while conforming to the uniform macrochat contract. [`create_provider`]
//! builds one from a [`ProviderKind`] plus credentials, falling back to each
//! vendor's default model when none is given.

pub mod common;

pub mod claude;
pub mod gemini;
pub mod openai;

use crate::macrochat::provider::LLMProvider;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default model used when [`create_provider`] gets no explicit model.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

/// The supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Claude,
    OpenAI,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "openai" => Ok(ProviderKind::OpenAI),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Build a provider adapter, using the vendor default model when `model`
/// is `None`.
///
/// # Example
///
/// ```rust,no_run
/// use macrochat::providers::{create_provider, ProviderKind};
///
/// let provider = create_provider(ProviderKind::Claude, "sk-ant-...", None);
/// assert_eq!(provider.model_id(), "claude-3-7-sonnet-20250219");
/// ```
pub fn create_provider(
    kind: ProviderKind,
    api_key: &str,
    model: Option<&str>,
) -> Arc<dyn LLMProvider> {
    match kind {
        ProviderKind::Claude => Arc::new(claude::ClaudeProvider::new_with_model_str(
            api_key,
            model.unwrap_or(DEFAULT_CLAUDE_MODEL),
        )),
        ProviderKind::OpenAI => Arc::new(openai::OpenAIProvider::new_with_model_str(
            api_key,
            model.unwrap_or(DEFAULT_OPENAI_MODEL),
        )),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new_with_model_str(
            api_key,
            model.unwrap_or(DEFAULT_GEMINI_MODEL),
        )),
    }
}
