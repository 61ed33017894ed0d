//! Chat-completions client for prediction requests.
//!
//! OpenAI and Perplexity expose the same chat-completions shape and differ
//! only in base URL and model name.

use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const PERPLEXITY_URL: &str = "https://api.perplexity.ai";

pub const SYSTEM_PROMPT: &str = "You are a financial expert and market analyst.";

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Perplexity,
}

impl LlmProvider {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Some(Self::OpenAi),
            "perplexity" | "ppx" => Some(Self::Perplexity),
            _ => None,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_URL,
            Self::Perplexity => PERPLEXITY_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4",
            Self::Perplexity => "sonar-reasoning-pro",
        }
    }
}

/// Model connection settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    /// Overrides the provider's base URL (used for proxies and tests).
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            api_key: None,
            base_url: None,
            model: LlmProvider::OpenAi.default_model().to_string(),
            max_tokens: 1000,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Anything that can answer a prompt with free text.
pub trait ChatModel: Send + Sync {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// HTTP chat-completions client.
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new client. Fails when no API key is configured.
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::BadRequest(format!(
                "no API key configured for {:?}",
                config.provider
            )));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        info!("LLM client ready: {:?} ({})", config.provider, config.model);
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.config.provider.base_url());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    async fn send(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending prediction request to {}", self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API error {}: {}", status, body);
            return Err(AppError::ExternalApi(format!("API error: {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Parse error: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::ExternalApi("empty completion".to_string()))
    }
}

impl ChatModel for LlmClient {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.send(system, prompt))
    }
}

/// Inputs assembled into a prediction prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub symbol: String,
    pub timeframe: String,
    pub candle_time: String,
    pub trend: String,
    pub pattern: String,
    pub indicators: String,
    pub news: Option<String>,
}

impl PromptContext {
    /// Render the user prompt, ending with the numbered answer block the
    /// reply parser understands.
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "Technical analysis for {} on the {} chart, candle {}.\n\n\
             Trend: {}\n\
             Candle pattern: {}\n\n\
             Indicators:\n{}\n",
            self.symbol, self.timeframe, self.candle_time, self.trend, self.pattern, self.indicators
        );

        if let Some(news) = self.news.as_deref().filter(|n| !n.trim().is_empty()) {
            prompt.push_str("\nRecent news:\n");
            prompt.push_str(news.trim());
            prompt.push('\n');
        }

        prompt.push_str(
            "\nYour response must strictly adhere to this structure:\n\
             1. Next candle trend: [buy/sell]\n\
             2. Confidence level: [Percentage]%\n\
             3. Key factors: [Brief explanation in English]\n\
             4. Resistance level (USD): [0000.00]\n\
             5. Support level (USD): [0000.00]\n\
             6. Short-term target price (USD): [0000.00]\n\
             7. Medium-term target price (USD): [0000.00]\n",
        );

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::from_str("OpenAI"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::from_str("perplexity"), Some(LlmProvider::Perplexity));
        assert_eq!(LlmProvider::from_str("claude"), None);
    }

    #[test]
    fn test_client_requires_key() {
        assert!(LlmClient::new(LlmConfig::default()).is_err());
    }

    #[test]
    fn test_endpoint_override() {
        let client = LlmClient::new(LlmConfig {
            api_key: Some("k".to_string()),
            base_url: Some("http://localhost:9000/v1/".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_prompt_contains_answer_block() {
        let ctx = PromptContext {
            symbol: "XAUUSD".to_string(),
            timeframe: "H2".to_string(),
            news: Some("Fed holds rates".to_string()),
            ..Default::default()
        };
        let prompt = ctx.render();
        assert!(prompt.contains("XAUUSD"));
        assert!(prompt.contains("Fed holds rates"));
        assert!(prompt.contains("7. Medium-term target price (USD)"));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":" hi "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" hi "));
    }
}
