//! OpenAI-compatible HTTP provider.
//!
//! Works with any `/chat/completions` endpoint: OpenAI, OpenRouter,
//! Ollama, vLLM, or a proxy. One non-streaming request per completion;
//! retry and backoff live in [`crate::retry`], not here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use wayfarer_config::ProviderConfig;
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{ModelProvider, Prompt};
use wayfarer_core::query::TurnRole;

pub struct HttpProvider {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("no API key set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            client,
        })
    }

    /// Flatten the prompt to chat-completions messages. This is the only
    /// place the trust boundary collapses into wire format: policy sections
    /// become the system message, everything else is data in it.
    fn to_messages(prompt: &Prompt) -> Vec<serde_json::Value> {
        let mut system = String::new();
        for section in &prompt.sections {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&format!("## {}\n{}", section.heading, section.body));
        }

        let mut messages = vec![json!({"role": "system", "content": system})];
        for turn in &prompt.history {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": turn.text}));
        }
        messages.push(json!({"role": "user", "content": prompt.user_text}));
        messages
    }
}

#[async_trait]
impl ModelProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        max_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": Self::to_messages(prompt),
            "max_tokens": max_tokens,
            "stream": false,
        });

        debug!(model = %self.model, chars = prompt.char_len(), "Sending completion request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError { status_code: status, message });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "no choices in response".into(),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

// --- Chat-completions wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::context::TrustLevel;
    use wayfarer_core::provider::PromptSection;
    use wayfarer_core::query::Turn;

    fn config_with_key() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".into()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let err = HttpProvider::new(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn messages_flatten_policy_first() {
        let prompt = Prompt {
            sections: vec![
                PromptSection {
                    trust: TrustLevel::Policy,
                    heading: "Policy".into(),
                    body: "rules".into(),
                },
                PromptSection {
                    trust: TrustLevel::TripData,
                    heading: "Trip data: calendar".into(),
                    body: "- Show at 20:00".into(),
                },
            ],
            history: vec![Turn::user("hi"), Turn::assistant("hello")],
            user_text: "what time is the show".into(),
        };

        let messages = HttpProvider::to_messages(&prompt);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        let system = messages[0]["content"].as_str().unwrap();
        assert!(system.starts_with("## Policy"));
        assert!(system.contains("Show at 20:00"));
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "what time is the show");
    }

    #[test]
    fn response_parsing() {
        let json = r#"{"choices":[{"message":{"content":"The show starts at 20:00."}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("The show starts at 20:00.")
        );
    }

    #[test]
    fn trailing_slash_stripped_from_url() {
        let config = ProviderConfig {
            api_url: "https://api.example.com/v1/chat/completions/".into(),
            ..config_with_key()
        };
        let provider = HttpProvider::new(&config).unwrap();
        assert!(!provider.api_url.ends_with('/'));
    }
}
