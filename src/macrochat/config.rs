//! Engine tuning knobs.

use std::sync::Arc;

/// Per-engine request parameters applied to every provider call.
///
/// The defaults match what the engine assumes when callers don't care:
/// a 4096 token completion budget and the provider-neutral temperature 1.0.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Steering text delivered out of band; never stored in the conversation.
    pub system_prompt: Option<Arc<str>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_tokens: 4096,
            temperature: 1.0,
            system_prompt: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.system_prompt = Some(Arc::from(system_prompt));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.temperature, 1.0);
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_max_tokens(1024)
            .with_temperature(0.2)
            .with_system_prompt("You are a terse assistant.");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.system_prompt.as_deref(), Some("You are a terse assistant."));
    }
}
