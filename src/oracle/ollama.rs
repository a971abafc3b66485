//! A real Ollama-backed oracle. Off by default (feature `ollama`); the
//! HTTP client is an out-of-scope external collaborator named in the
//! system overview.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{OracleError, Result};

use super::Oracle;

/// Connect timeout for oracle HTTP calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout for oracle HTTP calls.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// A blocking HTTP client talking to a local Ollama instance.
pub struct OllamaOracle {
    base_url: String,
    embed_model: String,
    chat_model: String,
    dimensions: usize,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

impl OllamaOracle {
    /// Builds a client against `base_url`, using `embed_model` and
    /// `chat_model` for the respective endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Unreachable`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        chat_model: impl Into<String>,
        dimensions: usize,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
            .build()
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            embed_model: embed_model.into(),
            chat_model: chat_model.into(),
            dimensions,
            client,
        })
    }
}

impl Oracle for OllamaOracle {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({ "model": self.embed_model, "prompt": text });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(map_reqwest_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OracleError::ModelMissing(self.embed_model.clone()).into());
        }
        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
        Ok(parsed.embedding)
    }

    fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.chat_model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(map_reqwest_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OracleError::ModelMissing(self.chat_model.clone()).into());
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> crate::error::Error {
    if err.is_timeout() {
        OracleError::Timeout {
            seconds: DEFAULT_READ_TIMEOUT.as_secs(),
        }
        .into()
    } else {
        OracleError::Unreachable(err.to_string()).into()
    }
}
