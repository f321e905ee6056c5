//! OpenAI-compatible vision API client.
//!
//! One extraction call per screenshot: the image goes up as a base64 data
//! URL with a fixed prompt, and the model's reply is expected to contain a
//! JSON object of metric name to value. Models wrap the JSON in prose
//! often enough that the parser slices from the first `{` to the last `}`
//! before deserializing.

use crate::config::VisionConfig;
use crate::input::ImageFormat;
use crate::metrics::ingest_raw;
use crate::models::MetricMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Extraction prompt sent with every screenshot.
const EXTRACTION_PROMPT: &str = r#"Analyze this story insights screenshot and extract the following numerical metrics: impressions, reach, profile visits, website clicks, link clicks, follows, shares, replies, story exits, story completion rate, forward taps, back taps, next story taps, and sticker taps.

Please return ONLY a valid JSON object with metric names as keys and their numerical values as numbers.
If a metric is not visible or unclear, omit it from the response.

Example format:
{
  "impressions": 1234,
  "reach": 987,
  "profile_visits": 56,
  "website_clicks": 8,
  "link_clicks": 15,
  "follows": 12,
  "shares": 5,
  "replies": 45,
  "story_exits": 3,
  "story_completion_rate": 87,
  "forward_taps": 20,
  "back_taps": 15,
  "next_story_taps": 22,
  "sticker_taps": 10
}"#;

/// Error from one extraction attempt.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("API key is not configured (set {API_KEY_ENV})")]
    MissingApiKey,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to vision API at {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Vision API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("No content received from the vision API")]
    EmptyResponse,

    #[error("Failed to parse metrics from the model response")]
    Parse,
}

impl ExtractError {
    /// Transient failures worth retrying.
    fn is_retryable(&self) -> bool {
        match self {
            ExtractError::Timeout(_)
            | ExtractError::Connect(_)
            | ExtractError::Transport(_) => true,
            ExtractError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat completion response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for the vision extraction API.
pub struct VisionClient {
    config: VisionConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl VisionClient {
    /// Create a new client, reading the API key from the environment.
    pub fn new(config: VisionConfig) -> Result<Self, ExtractError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ExtractError::MissingApiKey)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    /// Extract metrics from one screenshot, retrying transient failures.
    pub async fn extract_metrics(
        &self,
        image: &[u8],
        format: ImageFormat,
    ) -> Result<MetricMap, ExtractError> {
        let mut attempt = 0;

        loop {
            match self.try_extract(image, format).await {
                Ok(metrics) => return Ok(metrics),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        "Extraction attempt {}/{} failed: {}",
                        attempt, self.config.retries, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_extract(
        &self,
        image: &[u8],
        format: ImageFormat,
    ) -> Result<MetricMap, ExtractError> {
        let url = format!("{}/chat/completions", self.config.api_url);
        let data_url = format!(
            "data:{};base64,{}",
            format.mime_type(),
            BASE64.encode(image)
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    ExtractError::Connect(self.config.api_url.clone())
                } else {
                    ExtractError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Transport(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ExtractError::EmptyResponse)?;

        debug!("Model response: {}", content);

        parse_metrics_from_content(&content)
    }
}

/// Recover the metric object from the model's reply.
///
/// Slices from the first `{` to the last `}` to shed any surrounding prose
/// or code fences, then parses and ingests the object.
fn parse_metrics_from_content(content: &str) -> Result<MetricMap, ExtractError> {
    let start = content.find('{').ok_or(ExtractError::Parse)?;
    let end = content.rfind('}').ok_or(ExtractError::Parse)?;
    if end < start {
        return Err(ExtractError::Parse);
    }

    let raw: serde_json::Value =
        serde_json::from_str(&content[start..=end]).map_err(|_| ExtractError::Parse)?;

    let object = raw.as_object().ok_or(ExtractError::Parse)?;

    Ok(ingest_raw(object))
}
