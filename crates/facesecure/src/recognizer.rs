use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error talking to the recognition provider. Transport problems and
/// malformed responses surface as `Unavailable`; the caller maps that to 503.
#[derive(Debug)]
pub enum RecognizerError {
    Unavailable(String),
}

impl fmt::Display for RecognizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizerError::Unavailable(msg) => {
                write!(f, "Recognition provider unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for RecognizerError {}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    image: &'a str,
}

/// Embedding for a single capture frame, plus the provider's own quality
/// estimate of that frame.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResult {
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub quality: f64,
}

/// Source of face embeddings. The production implementation talks to the
/// external provider over HTTP; tests substitute their own.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Produce an embedding for a base64-encoded capture frame.
    async fn generate_embedding(
        &self,
        image_base64: &str,
    ) -> Result<EmbeddingResult, RecognizerError>;
}

/// HTTP client for the external recognition provider.
#[derive(Clone)]
pub struct RecognitionClient {
    client: reqwest::Client,
    base_url: String,
}

impl RecognitionClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(RecognitionClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RecognitionClient {
    async fn generate_embedding(
        &self,
        image_base64: &str,
    ) -> Result<EmbeddingResult, RecognizerError> {
        let url = format!("{}/generate-embedding", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest { image: image_base64 })
            .send()
            .await
            .map_err(|e| RecognizerError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RecognizerError::Unavailable(format!(
                "provider returned {}",
                response.status()
            )));
        }

        response
            .json::<EmbeddingResult>()
            .await
            .map_err(|e| RecognizerError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let client = RecognitionClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn embedding_result_quality_defaults_to_zero() {
        let result: EmbeddingResult =
            serde_json::from_str(r#"{"embedding": [0.1, 0.2]}"#).unwrap();
        assert_eq!(result.embedding.len(), 2);
        assert_eq!(result.quality, 0.0);
    }

}
