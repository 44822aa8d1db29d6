//! Converts inbound images and voice notes into text for the router.

pub mod archive;
pub mod audio;
pub mod fetcher;
pub mod vision;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::MediaConfig;
use crate::llm::{LlmError, Transcriber};
use crate::users::User;

pub use archive::MediaArchive;
pub use fetcher::{FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use vision::{LlmVisionDescriber, VisionDescriber};

pub const IMAGE_UNAVAILABLE: &str =
    "[Photo of a meal. Image analysis is unavailable right now, so no description is available.]";
pub const TRANSCRIPTION_UNAVAILABLE: &str =
    "[Voice message. Transcription is temporarily unavailable.]";

fn image_fallback_with_caption(caption: &str) -> String {
    format!("[Photo of a meal. Image analysis is unavailable.] The user says: {caption}")
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported media type {0}")]
    UnsupportedType(String),
    #[error("media download returned HTTP {0}")]
    DownloadStatus(u16),
    #[error("media download failed: {0}")]
    DownloadTransport(#[source] reqwest::Error),
    #[error("audio too small ({size} bytes, minimum {min})")]
    AudioTooSmall { size: usize, min: usize },
    #[error("audio too large ({size} bytes, maximum {max})")]
    AudioTooLarge { size: usize, max: usize },
    #[error("unsupported audio format {0}")]
    UnsupportedAudioFormat(String),
    #[error("transcription timed out")]
    Timeout,
    #[error("transcription failed: {0}")]
    Transcription(#[source] LlmError),
    #[error("transcript does not look like {0}")]
    LanguageMismatch(String),
    #[error("image description failed: {0}")]
    Vision(#[source] LlmError),
}

impl MediaError {
    /// Download problems, as opposed to analysis problems.
    pub fn is_download(&self) -> bool {
        matches!(self, MediaError::DownloadStatus(_) | MediaError::DownloadTransport(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn of(mime_type: &str) -> Option<Self> {
        let mime = audio::essence(mime_type);
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// Text ready for routing. `fallback_reason` is set when a placeholder stands in
/// for the real description or transcript.
#[derive(Debug)]
pub struct ProcessedMedia {
    pub text: String,
    pub kind: MediaKind,
    pub fallback_reason: Option<MediaError>,
}

pub struct MediaPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    vision: Arc<dyn VisionDescriber>,
    transcriber: Arc<dyn Transcriber>,
    archive: Option<MediaArchive>,
    config: MediaConfig,
}

impl MediaPipeline {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        vision: Arc<dyn VisionDescriber>,
        transcriber: Arc<dyn Transcriber>,
        archive: Option<MediaArchive>,
        config: MediaConfig,
    ) -> Self {
        Self {
            fetcher,
            vision,
            transcriber,
            archive,
            config,
        }
    }

    /// Errors only for unsupported types and failed downloads; analysis failures
    /// degrade to placeholder text. Without a declared `mime_type` the download's
    /// `Content-Type` decides.
    #[instrument(skip_all, fields(mime = ?mime_type))]
    pub async fn process_media(
        &self,
        url: &str,
        mime_type: Option<&str>,
        caption: Option<&str>,
        user: Option<&User>,
    ) -> Result<ProcessedMedia, MediaError> {
        if let Some(declared) = mime_type {
            MediaKind::of(declared).ok_or_else(|| MediaError::UnsupportedType(declared.to_string()))?;
        }
        let media = self.fetcher.fetch(url).await?;
        let mime_type = mime_type
            .or(media.content_type.as_deref())
            .unwrap_or("application/octet-stream");
        let kind = MediaKind::of(mime_type)
            .ok_or_else(|| MediaError::UnsupportedType(mime_type.to_string()))?;
        let mime = audio::essence(mime_type);

        if let (Some(archive), Some(user)) = (&self.archive, user) {
            if user.store_media {
                match archive.archive(user.id, media.bytes.clone(), &mime).await {
                    Ok(key) => info!(user_id = %user.id, %key, "media archived"),
                    Err(e) => warn!(user_id = %user.id, error = %e, "media archive failed"),
                }
            }
        }

        let caption = caption.map(str::trim).filter(|c| !c.is_empty());
        let processed = match kind {
            MediaKind::Image => self.describe_image(&media, &mime, caption).await,
            MediaKind::Audio => {
                let language = user.map(|u| u.language.as_str());
                self.transcribe_audio(media, &mime, language).await
            }
        };
        Ok(processed)
    }

    async fn describe_image(&self, media: &FetchedMedia, mime: &str, caption: Option<&str>) -> ProcessedMedia {
        match self.vision.describe(&media.bytes, mime, caption).await {
            Ok(text) => ProcessedMedia {
                text,
                kind: MediaKind::Image,
                fallback_reason: None,
            },
            Err(e) => {
                warn!(error = %e, "image description failed, using fallback text");
                ProcessedMedia {
                    text: caption
                        .map(image_fallback_with_caption)
                        .unwrap_or_else(|| IMAGE_UNAVAILABLE.to_string()),
                    kind: MediaKind::Image,
                    fallback_reason: Some(MediaError::Vision(e)),
                }
            }
        }
    }

    async fn transcribe_audio(&self, media: FetchedMedia, mime: &str, language: Option<&str>) -> ProcessedMedia {
        match self.try_transcribe(media, mime, language).await {
            Ok(text) => ProcessedMedia {
                text,
                kind: MediaKind::Audio,
                fallback_reason: None,
            },
            Err(e) => {
                warn!(error = %e, "transcription failed, using fallback text");
                ProcessedMedia {
                    text: TRANSCRIPTION_UNAVAILABLE.to_string(),
                    kind: MediaKind::Audio,
                    fallback_reason: Some(e),
                }
            }
        }
    }

    async fn try_transcribe(
        &self,
        media: FetchedMedia,
        mime: &str,
        language: Option<&str>,
    ) -> Result<String, MediaError> {
        audio::validate_audio(media.bytes.len(), mime, &self.config)?;

        let call = self.transcriber.transcribe(media.bytes, mime, language);
        let text = tokio::time::timeout(self.config.transcribe_timeout(), call)
            .await
            .map_err(|_| MediaError::Timeout)?
            .map_err(MediaError::Transcription)?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(MediaError::Transcription(LlmError::Other("empty transcript".into())));
        }

        if let (true, Some(language)) = (self.config.language_check, language) {
            if !audio::matches_language(&text, language) {
                return Err(MediaError::LanguageMismatch(language.to_string()));
            }
        }
        Ok(text)
    }
}
