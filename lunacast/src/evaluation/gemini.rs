//! Google Gemini `generateContent` evaluator

use super::{decode_evaluation, Conditions, Evaluation, Evaluator};
use crate::error::{ForecastError, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::debug;

/// Default generative model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
/// API base URL
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Environment variable holding the API key
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Evaluator backed by the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiEvaluator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiEvaluator {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Read the API key from `GEMINI_API_KEY`
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let key = env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ForecastError::ConfigError(format!("{} is not set", GEMINI_API_KEY_ENV)))?;
        Self::new(key, timeout)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Evaluator for GeminiEvaluator {
    fn evaluate(&self, conditions: &Conditions) -> Result<Evaluation> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": conditions.prompt() }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        debug!(date = %conditions.date, model = %self.model, "Requesting evaluation");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ForecastError::EvaluationError(format!("request failed: {}", e)))?;

        let decoded: GenerateResponse = response
            .json()
            .map_err(|e| ForecastError::EvaluationError(format!("unexpected response: {}", e)))?;

        let text = decoded
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| ForecastError::EvaluationError("response has no text".to_string()))?;

        decode_evaluation(&text)
    }
}
