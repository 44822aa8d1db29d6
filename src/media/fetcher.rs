use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::MediaError;
use crate::config::TwilioConfig;

#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Downloads provider-hosted media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError>;
}

/// Fetches Twilio media URLs, which require the account credentials as Basic auth.
#[derive(Clone)]
pub struct HttpMediaFetcher {
    http: reqwest::Client,
    username: String,
    password: String,
}

impl HttpMediaFetcher {
    pub fn new(config: &TwilioConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            username: config.account_sid.clone(),
            password: config.auth_token.clone(),
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(MediaError::DownloadTransport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadStatus(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(MediaError::DownloadTransport)?;
        debug!(size = bytes.len(), ?content_type, "media downloaded");
        Ok(FetchedMedia { bytes, content_type })
    }
}
