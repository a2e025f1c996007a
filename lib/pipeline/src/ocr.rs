use crate::collaborators::{Bitmap, OcrEngine};
use crate::image_loader::encode_png;
use anyhow::{Context, Result};
use async_trait::async_trait;
use receiptx_core::RawLine;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Client for an OCR sidecar service.
///
/// The service receives a PNG body and answers `{"lines": ["..", ..]}`
/// with lines in reading order.
pub struct HttpOcrEngine {
    client: Client,
    url: String,
}

impl HttpOcrEngine {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Vec<String>,
}

/// Decode an OCR sidecar reply, dropping blank lines.
pub fn parse_ocr_response(body: &str) -> Result<Vec<RawLine>> {
    let response: OcrResponse = serde_json::from_str(body).context("malformed OCR response")?;
    Ok(response
        .lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn extract(&self, bitmap: &Bitmap) -> Result<Vec<RawLine>> {
        let png = encode_png(bitmap)?;
        debug!(url = %self.url, bytes = png.len(), "Sending image to OCR service");

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "image/png")
            .body(png)
            .send()
            .await
            .context("OCR HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("OCR service returned {}: {}", status, error_body);
        }

        let body = response.text().await.context("failed to read OCR response")?;
        parse_ocr_response(&body)
    }
}
