use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::config::OpenAiConfig;
use crate::llm::dto::{ChatRequest, ChatResponse, TranscriptionResponse};
use crate::llm::LlmError;

/// Chat-completion capability shared by the intent router, meal analyzer and vision path.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Bytes,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    transcribe_model: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> anyhow::Result<Self> {
        // Transcription has its own tighter deadline; this caps every other call.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transcribe_model: config.transcribe_model.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(%status, "openai api error");
        Err(LlmError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        debug!(model = %request.model, tools = request.tools.len(), "chat completion");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(
        &self,
        audio: Bytes,
        mime_type: &str,
        language: Option<&str>,
    ) -> Result<String, LlmError> {
        let file_name = format!("voice.{}", audio_extension(mime_type));
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name)
            .mime_str(mime_type)?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.transcribe_model.clone())
            .part("file", part);
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        let parsed: TranscriptionResponse = serde_json::from_str(&body)?;
        Ok(parsed.text)
    }
}

fn audio_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_extension_matches_whisper_formats() {
        assert_eq!(audio_extension("audio/ogg"), "ogg");
        assert_eq!(audio_extension("audio/mpeg"), "mp3");
        assert_eq!(audio_extension("audio/x-m4a"), "m4a");
        assert_eq!(audio_extension("audio/amr"), "bin");
    }
}
