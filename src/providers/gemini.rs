use super::util::{RetryPolicy, with_retry};
use crate::core::config::GeminiProviderConfig;
use crate::core::error::ParseError;
use crate::core::parser::{ParsedTransaction, TransactionParser};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

const PROMPT: &str = "Extract all transactions from the text below. \
Return only a valid JSON list where each item has the fields: \
ticker, quantity, price, date (YYYY-MM-DD), label and portfolio. \
Use a negative quantity for sales. Do not add anything else.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Strips markdown code fences and a leading `json` tag from model output.
fn strip_fences(text: &str) -> &str {
    let text = text.trim().trim_matches('`').trim();
    text.strip_prefix("json").unwrap_or(text).trim()
}

/// Transaction parser backed by the Gemini `generateContent` API.
pub struct GeminiTransactionParser {
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_output_tokens: u32,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GeminiTransactionParser {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        max_output_tokens: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tickerfolio/1.0")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_output_tokens,
            retry: RetryPolicy::default(),
            client,
        })
    }

    /// Builds a parser from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &GeminiProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!("{} is not set", config.api_key_env);
        }
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.max_output_tokens,
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl TransactionParser for GeminiTransactionParser {
    #[instrument(name = "GeminiParse", skip_all, fields(model = %self.model))]
    async fn parse(&self, raw_text: &str) -> Result<Vec<ParsedTransaction>, ParseError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ParseError::Request("no Gemini API key configured".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: PROMPT }, Part { text: raw_text }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: self.max_output_tokens,
            },
        };
        debug!("Requesting transaction extraction from {}", url);

        let response = with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", api_key)
                    .json(&request)
                    .send()
            },
            self.retry,
        )
        .await
        .map_err(|e| ParseError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParseError::Request(format!("HTTP error: {status}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ParseError::InvalidResponse(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| ParseError::InvalidResponse("no candidates returned".to_string()))?;

        let cleaned = strip_fences(&text);
        serde_json::from_str(cleaned).map_err(|e| {
            error!(error = ?e, response = %text, "Failed to decode extracted transactions");
            ParseError::InvalidResponse(e.to_string())
        })
    }
}
