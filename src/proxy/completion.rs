use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::CompletionConfig;
use crate::error::ProxyError;

/// Sampling settings forwarded with every prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub p: f32,
    pub k: u32,
    pub stop_sequences: Vec<String>,
    pub return_likelihoods: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.75,
            p: 0.01,
            k: 0,
            stop_sequences: Vec::new(),
            return_likelihoods: "NONE".to_string(),
        }
    }
}

impl From<&CompletionConfig> for GenerationParams {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            p: config.p,
            k: config.k,
            stop_sequences: config.stop_sequences.clone(),
            return_likelihoods: config.return_likelihoods.clone(),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProxyError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    text: String,
}

/// Calls a text-generation endpoint that answers `{"generations": [{"text": ...}]}`.
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpCompletionProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        })
    }

    pub fn from_config(config: &CompletionConfig, timeout: Duration) -> Result<Self, ProxyError> {
        Self::new(config.endpoint.clone(), config.api_key.clone(), config.model.clone(), timeout)
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProxyError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            params,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?;
        match res.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ProxyError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => return Err(ProxyError::RateLimited),
            status => {
                let detail = res.text().await.unwrap_or_default();
                error!("Completion endpoint returned {}: {}", status, detail);
                return Err(ProxyError::ResponseError(format!("status {}", status)));
            }
        }

        let parsed: GenerateResponse = res.json().await?;
        let text = parsed
            .generations
            .into_iter()
            .next()
            .map(|g| g.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProxyError::ResponseError("empty completion".into()))?;

        debug!("Completion returned {} bytes", text.len());
        Ok(text)
    }
}
