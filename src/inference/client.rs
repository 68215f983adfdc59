use super::request::{GenerateRequest, GenerateResponse};
use crate::config::InferenceConfig;
use crate::error::{InferenceError, PoetryCamError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Longest error body kept in a status error
const MAX_ERROR_BODY: usize = 200;

/// A vision model that turns an image into a poem
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Generate a poem for one JPEG image. No retries.
    async fn generate(&self, model: &str, image: &[u8]) -> std::result::Result<String, InferenceError>;

    /// Cheap reachability probe used at startup
    async fn check_liveness(&self) -> std::result::Result<(), InferenceError>;
}

/// Client for a locally hosted Ollama service
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    liveness_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                PoetryCamError::component(
                    "inference".to_string(),
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            liveness_timeout: config.liveness_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    fn classify(&self, error: reqwest::Error, timeout: Duration) -> InferenceError {
        if error.is_timeout() {
            InferenceError::Timeout { timeout }
        } else if error.is_connect() || error.is_request() {
            debug!("Inference transport error: {}", error);
            InferenceError::ConnectionFailed {
                url: self.base_url.clone(),
            }
        } else {
            InferenceError::Malformed {
                details: error.to_string(),
            }
        }
    }

    async fn status_error(response: reqwest::Response) -> InferenceError {
        let status = response.status().as_u16();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        InferenceError::Status { status, body }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, model: &str, image: &[u8]) -> std::result::Result<String, InferenceError> {
        let request = GenerateRequest::poem(model, image);
        debug!(
            "Sending {} byte image to {} (model {})",
            image.len(),
            self.generate_url(),
            model
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify(e, self.timeout))?;

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::Malformed {
                details: format!("invalid JSON: {}", e),
            })?;

        match parsed.response {
            Some(text) if !text.trim().is_empty() => {
                info!("Received {} character poem from {}", text.len(), model);
                Ok(text)
            }
            Some(_) => Err(InferenceError::Malformed {
                details: "empty 'response' field".to_string(),
            }),
            None => Err(InferenceError::Malformed {
                details: "missing 'response' field".to_string(),
            }),
        }
    }

    async fn check_liveness(&self) -> std::result::Result<(), InferenceError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.liveness_timeout)
            .send()
            .await
            .map_err(|e| self.classify(e, self.liveness_timeout))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!("Inference service at {} is reachable", self.base_url);
        Ok(())
    }
}
