//! HTTP client abstraction for the chat service and package lookups.
//!
//! A trait over reqwest so the assistant and the AUR check can be tested
//! against canned responses.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Minimal HTTP surface used by the shell.
///
/// # Example
///
/// ```ignore
/// use crust::http_client::{HttpClient, ReqwestHttpClient};
///
/// let client = ReqwestHttpClient::new();
/// let pkgbuild = client.get_text("https://aur.archlinux.org/...").await?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response text.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String>;

    /// Sends a GET request and returns the response text.
    ///
    /// Non-success status codes are errors.
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// Production client backed by reqwest.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(body).send().await?;
        Ok(response.text().await?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {} returned {}", url, status));
        }
        Ok(response.text().await?)
    }
}
