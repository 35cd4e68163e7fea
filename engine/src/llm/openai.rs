use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use crate::secrets::{self, SecretSource};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// OpenAI-compatible chat completions provider, always in JSON mode
pub struct OpenAIProvider {
    config: LLMConfig,
    secrets: Arc<dyn SecretSource>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig, secrets: Arc<dyn SecretSource>) -> Self {
        Self {
            config,
            secrets,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.secrets.has_secret(secrets::OPENAI_API_KEY)
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let api_key = self
            .secrets
            .get_secret(secrets::OPENAI_API_KEY)
            .ok_or_else(|| LLMError::NotConfigured(secrets::OPENAI_API_KEY.to_string()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Http {
                status: status.as_u16(),
                body: secrets::scrub(&text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        data.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| LLMError::ParseError("No message content in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecrets;

    #[test]
    fn test_configured_follows_secret_source() {
        let store = Arc::new(MemorySecrets::new());
        let provider = OpenAIProvider::new(LLMConfig::default(), store.clone());

        assert_eq!(provider.name(), "openai");
        assert!(!provider.is_configured());

        store.set(secrets::OPENAI_API_KEY, "sk-test");
        assert!(provider.is_configured());
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_closed() {
        let provider = OpenAIProvider::new(LLMConfig::default(), Arc::new(MemorySecrets::new()));
        let err = provider
            .generate(&[Message::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::NotConfigured(_)));
    }
}
