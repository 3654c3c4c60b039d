//! AI-generated analysis: prompt construction, chat backends and reply validation.

pub mod anthropic;
pub mod backend;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod reply;

use std::fmt;
use std::str::FromStr;

pub use anthropic::AnthropicBackend;
pub use backend::ChatBackend;
pub use openai::OpenAiBackend;
pub use prompt::{AnalysisPrompt, PromptBuilder};
pub use provider::ChatAnalysisProvider;
pub use reply::{extract_json, parse_reply};

/// Which chat backend is tried first. The other one is its alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl AiProviderKind {
    pub fn alternate(self) -> Self {
        match self {
            AiProviderKind::OpenAi => AiProviderKind::Anthropic,
            AiProviderKind::Anthropic => AiProviderKind::OpenAi,
        }
    }
}

impl fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProviderKind::OpenAi => f.write_str("openai"),
            AiProviderKind::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl FromStr for AiProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(AiProviderKind::Anthropic),
            other => Err(format!("expected 'openai' or 'anthropic', got '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind() {
        assert_eq!("Anthropic".parse::<AiProviderKind>(), Ok(AiProviderKind::Anthropic));
        assert_eq!(AiProviderKind::OpenAi.alternate(), AiProviderKind::Anthropic);
        assert_eq!(AiProviderKind::Anthropic.alternate().to_string(), "openai");
        assert!("gemini".parse::<AiProviderKind>().is_err());
    }
}
