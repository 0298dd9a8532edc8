use crate::config::Config;
use crate::conversation::{Message, Role};
use crate::http_client::HttpClient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const COHERE_CHAT_URL: &str = "https://api.cohere.com/v1/chat";

/// Remote reasoning service that continues a conversation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the assistant's reply to the full `messages` history, whose
    /// last element is the newest USER message.
    async fn chat(&self, messages: &[Message]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CohereTurn<'a> {
    role: &'static str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    text: String,
}

fn cohere_role(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "CHATBOT",
    }
}

/// Cohere chat API client.
pub struct CohereClient {
    http: Arc<dyn HttpClient>,
    api_key: Option<String>,
    model: String,
}

impl CohereClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
        }
    }

    fn build_request_body(&self, messages: &[Message]) -> Result<serde_json::Value> {
        let (last, history) = messages
            .split_last()
            .ok_or_else(|| anyhow!("Cannot send an empty conversation"))?;

        let chat_history: Vec<CohereTurn> = history
            .iter()
            .map(|m| CohereTurn {
                role: cohere_role(m.role),
                message: &m.text,
            })
            .collect();

        Ok(json!({
            "model": self.model,
            "message": last.text,
            "chat_history": chat_history,
        }))
    }
}

#[async_trait]
impl ChatClient for CohereClient {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Err(anyhow!(
                "No Cohere API key found. Please set it using one of these methods:

1. Set API key in config:
   crust --set-api-key your-key-here

2. Set environment variable:
   export COHERE_API_KEY=your-key-here

3. Check current config:
   crust --config"
            ));
        };

        let body = self.build_request_body(messages)?;
        let authorization = format!("Bearer {}", api_key);
        let headers = [
            ("Authorization", authorization.as_str()),
            ("content-type", "application/json"),
            ("accept", "application/json"),
        ];

        info!("Sending {} messages to Cohere", messages.len());
        let response_text = self.http.post_json(COHERE_CHAT_URL, &headers, &body).await?;

        match serde_json::from_str::<CohereResponse>(&response_text) {
            Ok(response) => Ok(response.text),
            Err(e) => {
                warn!("Failed to parse Cohere response: {}", e);
                Err(anyhow!(
                    "Failed to parse chat API response.\nRaw response: {}",
                    response_text
                ))
            }
        }
    }
}

/// Offline stand-in used when `CRUST_USE_MOCK` is set.
pub struct MockChatClient;

impl MockChatClient {
    pub fn new() -> Self {
        Self
    }

    pub fn mock_reply(&self, messages: &[Message]) -> String {
        let last = messages.last().map(|m| m.text.as_str()).unwrap_or_default();

        if last.starts_with("The command `") || last.starts_with("Contents of `") {
            "Thanks, that is what I needed.".to_string()
        } else if last.contains("list") && last.contains("file") {
            "Let me look.\nEXECUTE ls".to_string()
        } else if last.contains("hostname") {
            "READ-FILE /etc/hostname".to_string()
        } else {
            format!("Mock reply to: {}", last)
        }
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        Ok(self.mock_reply(messages))
    }
}

/// The chat client selected by `config`.
pub fn from_config(config: &Config, http: Arc<dyn HttpClient>) -> Arc<dyn ChatClient> {
    if config.is_mock_mode() {
        info!("Using mock chat client (CRUST_USE_MOCK=1)");
        Arc::new(MockChatClient::new())
    } else {
        Arc::new(CohereClient::new(
            http,
            config.get_api_key().cloned(),
            config.model.clone(),
        ))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::mock::MockHttpClient;

    fn conversation() -> Vec<Message> {
        vec![
            Message::system("rules"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("what now?"),
        ]
    }

    #[tokio::test]
    async fn test_cohere_request_splits_last_message() {
        let http = Arc::new(MockHttpClient::new(r#"{"text":"do this"}"#));
        let client = CohereClient::new(http.clone(), Some("key".to_string()), "command-r");

        let reply = client.chat(&conversation()).await.unwrap();

        assert_eq!(reply, "do this");
        let requests = http.requests.lock().unwrap();
        let (url, body) = &requests[0];
        assert_eq!(url, COHERE_CHAT_URL);
        let body = body.as_ref().unwrap();
        assert_eq!(body["message"], "what now?");
        assert_eq!(body["model"], "command-r");
        let history = body["chat_history"].as_array().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0]["role"], "SYSTEM");
        assert_eq!(history[2]["role"], "CHATBOT");
        assert_eq!(history[2]["message"], "hello");
    }

    #[tokio::test]
    async fn test_cohere_without_key_is_an_error() {
        let http = Arc::new(MockHttpClient::new("{}"));
        let client = CohereClient::new(http.clone(), None, "command-r");

        let err = client.chat(&conversation()).await.unwrap_err();

        assert!(err.to_string().contains("No Cohere API key"));
        assert!(http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cohere_unparseable_response_is_an_error() {
        let http = Arc::new(MockHttpClient::new(r#"{"message":"invalid api token"}"#));
        let client = CohereClient::new(http, Some("bad".to_string()), "command-r");

        let err = client.chat(&conversation()).await.unwrap_err();

        assert!(err.to_string().contains("invalid api token"));
    }

    #[tokio::test]
    async fn test_cohere_empty_conversation_is_an_error() {
        let http = Arc::new(MockHttpClient::new(r#"{"text":"x"}"#));
        let client = CohereClient::new(http, Some("key".to_string()), "command-r");

        assert!(client.chat(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_requests_listing() {
        let reply = MockChatClient::new()
            .chat(&[Message::user("list my files")])
            .await
            .unwrap();

        assert!(reply.contains("EXECUTE ls"));
    }

    #[test]
    fn test_from_config_honours_mock_mode() {
        let mut config = Config::default();
        config.use_mock = true;
        let http: Arc<dyn HttpClient> = Arc::new(MockHttpClient::new(""));

        // Mock mode must not need a key.
        let client = from_config(&config, http);
        let reply = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.chat(&[Message::user("ping")]))
            .unwrap();
        assert_eq!(reply, "Mock reply to: ping");
    }
}
