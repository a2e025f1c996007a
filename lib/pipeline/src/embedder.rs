use anyhow::{Context, Result};
use async_trait::async_trait;
use receiptx_core::{Embedder, Vector};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            dimension,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Decode an embeddings reply and check its dimension.
pub fn parse_embedding_response(body: &str, dimension: usize) -> Result<Vector> {
    let response: EmbedResponse = serde_json::from_str(body).context("malformed embedding response")?;
    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .context("empty embedding response")?;
    if embedding.len() != dimension {
        anyhow::bail!("expected embedding of length {}, got {}", dimension, embedding.len());
    }
    Ok(Vector::new(embedding))
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vector> {
        let body = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let mut request = self.client.post(format!("{}/embeddings", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .context("embedding HTTP request failed")?
            .error_for_status()?;
        let body = response.text().await.context("failed to read embedding response")?;
        parse_embedding_response(&body, self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding() {
        let v = parse_embedding_response(r#"{"data": [{"embedding": [0.1, 0.2, 0.3]}]}"#, 3).unwrap();
        assert_eq!(v.as_slice(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(parse_embedding_response(r#"{"data": [{"embedding": [0.1]}]}"#, 3).is_err());
    }

    #[test]
    fn test_empty_data() {
        assert!(parse_embedding_response(r#"{"data": []}"#, 3).is_err());
    }
}
