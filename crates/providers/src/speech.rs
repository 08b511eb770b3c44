//! Speech-to-text adapters.

use crate::util::{from_reqwest, send_with_retry};
use lt_domain::config::TranscriptionConfig;
use lt_domain::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "openai_transcribe";

/// Audio received from the client, passed through untouched.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Turns recorded audio into raw recognised text.
#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String>;
}

/// OpenAI-compatible `/audio/transcriptions` client.
pub struct OpenAiTranscriber {
    url: String,
    api_key: Option<String>,
    model: String,
    language: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl OpenAiTranscriber {
    pub fn from_config(cfg: &TranscriptionConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            url: format!("{}/audio/transcriptions", cfg.base_url.trim_end_matches('/')),
            api_key,
            model: cfg.model.clone(),
            language: cfg.language.clone(),
            client,
        })
    }

    fn form(&self, audio: &AudioUpload) -> Result<reqwest::multipart::Form> {
        let mut part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone());
        if let Some(ct) = &audio.content_type {
            part = part
                .mime_str(ct)
                .map_err(|e| Error::Other(format!("invalid audio content type: {e}")))?;
        }
        Ok(reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone()))
    }
}

#[async_trait::async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        // Validate the part once up front; the retry closure must not fail.
        self.form(&audio)?;

        tracing::debug!(
            provider = PROVIDER,
            bytes = audio.bytes.len(),
            model = %self.model,
            "transcription request"
        );

        let resp = send_with_retry(PROVIDER, 1, 250, || {
            let rb = self.client.post(&self.url);
            let rb = match &self.api_key {
                Some(key) => rb.bearer_auth(key),
                None => rb,
            };
            match self.form(&audio) {
                Ok(form) => rb.multipart(form),
                Err(_) => rb,
            }
        })
        .await?;

        let body: TranscriptionResponse = resp.json().await.map_err(from_reqwest)?;
        Ok(body.text)
    }
}
