//! LLM provider configuration

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completions provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (`OPENAI_API_KEY`); empty when unset
    #[serde(skip_serializing, default = "empty_secret")]
    pub api_key: SecretString,
    /// Tool-capable chat model
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the chat completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        OpenAiConfig {
            api_key: empty_secret(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

pub(crate) fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    120
}
