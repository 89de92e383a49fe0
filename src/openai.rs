//! HTTP client for OpenAI-compatible providers (OpenAI, OpenRouter, local gateways)

use crate::completion::{ChatCompletionPayload, ResponsesPayload};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::llm_client::LlmClient;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// OpenAI-compatible API client
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: ProviderConfig,
}

impl OpenAiClient {
    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = ProviderConfig::from_env()?;
        Self::new(config)
    }

    /// Create a new client with the given configuration
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn post<P: Serialize + ?Sized>(&self, path: &str, payload: &P) -> Result<Value> {
        let url = format!("{}/{}", self.config.base_url.as_str().trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("X-Title", &self.config.app_name)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::provider(format!(
                "POST {} failed with status {}: {}",
                path, status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn create_response(&self, payload: &ResponsesPayload) -> Result<Value> {
        self.post("responses", payload).await
    }

    async fn create_chat_completion(&self, payload: &ChatCompletionPayload) -> Result<Value> {
        self.post("chat/completions", payload).await
    }

    fn client_type(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{complete, CompletionRequest};
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> OpenAiClient {
        let config = ProviderConfig::new("test-key", &server.url()).unwrap();
        OpenAiClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_responses_endpoint_answers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/responses")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "output_text": "hello", "usage": { "total_tokens": 4 } }).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let response = complete(&client, &CompletionRequest::new("gpt-4", "s", "u", 0.1))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "hello");
        assert_eq!(response.usage.unwrap().total_tokens, Some(4));
    }

    #[tokio::test]
    async fn test_unsupported_responses_endpoint_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("POST", "/responses")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;
        let fallback = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "from chat" } }],
                    "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = complete(&client, &CompletionRequest::new("gpt-4", "s", "u", 0.1))
            .await
            .unwrap();

        primary.assert_async().await;
        fallback.assert_async().await;
        assert_eq!(response.text, "from chat");
        assert_eq!(response.usage.unwrap().prompt_tokens, Some(3));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = client_for(&server);
        let payload = ChatCompletionPayload {
            model: "m".to_string(),
            messages: vec![],
            temperature: 0.0,
            max_tokens: None,
            stop: None,
            tools: None,
        };
        let err = client.create_chat_completion(&payload).await.unwrap_err();
        assert!(matches!(&err, Error::Provider(msg) if msg.contains("overloaded")));
    }
}
