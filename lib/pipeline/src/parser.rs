//! LLM-backed structured parsing of OCR lines into a draft receipt.

use crate::collaborators::StructuredParser;
use anyhow::{Context, Result};
use async_trait::async_trait;
use receiptx_core::{DraftReceipt, RawLine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You turn noisy OCR lines from a retail receipt into JSON. \
Fix obvious OCR typos, preferring the user's known product names when a line clearly refers to one. \
Reply with a single JSON object: \
{\"timestamp\": ISO-8601 string or null, \"items\": [{\"product_name\": string, \"quantity\": number}], \"total_price\": number or null}. \
Do not include any other text.";

/// Parser using an OpenAI-compatible chat completions endpoint
pub struct LlmStructuredParser {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmStructuredParser {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Build the user prompt from OCR lines and known product names.
pub fn build_user_prompt(lines: &[RawLine], known_product_names: &BTreeSet<String>) -> String {
    let mut prompt = String::from("Known products:\n");
    for name in known_product_names {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push('\n');
    }
    prompt.push_str("\nOCR lines:\n");
    for line in lines {
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}

/// Extract the draft JSON object from a model reply.
///
/// Tolerates code fences and prose around the object.
pub fn parse_draft_content(content: &str) -> Result<DraftReceipt> {
    let start = content.find('{').context("no JSON object in model reply")?;
    let end = content.rfind('}').context("no JSON object in model reply")?;
    if end < start {
        anyhow::bail!("no JSON object in model reply");
    }
    serde_json::from_str(&content[start..=end]).context("model reply is not a valid draft receipt")
}

#[async_trait]
impl StructuredParser for LlmStructuredParser {
    async fn parse(&self, lines: &[RawLine], known_product_names: &BTreeSet<String>) -> Result<DraftReceipt> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(lines, known_product_names),
                },
            ],
            temperature: 0.0,
        };

        debug!(model = %self.model, lines = lines.len(), "Sending OCR lines to parser model");

        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.context("parser HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("parser model returned {}: {}", status, error_body);
        }

        let chat: ChatResponse = response.json().await.context("failed to parse chat response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("empty chat response")?;

        parse_draft_content(&content)
    }
}
