pub mod anthropic;
pub mod error;
pub mod json;
pub mod openai;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
            Provider::OpenAI => f.write_str("openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            other => anyhow::bail!("unknown LLM_PROVIDER: {other:?} (expected openai|anthropic)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Text in, text out. No streaming, no tool calls.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Box<dyn LlmClient>> {
    Ok(match settings.llm_provider {
        Provider::OpenAI => Box::new(openai::OpenAiClient::from_settings(settings)?),
        Provider::Anthropic => Box::new(anthropic::AnthropicClient::from_settings(settings)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        assert_eq!(" OpenAI ".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!(Provider::OpenAI.to_string(), "openai");
        assert!("ollama".parse::<Provider>().is_err());
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let v = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "system", "content": "hi"}));
    }
}
