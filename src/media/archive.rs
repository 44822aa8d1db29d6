use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::storage::StorageClient;

/// Copies inbound media into object storage for users who opted in.
#[derive(Clone)]
pub struct MediaArchive {
    storage: Arc<dyn StorageClient>,
}

impl MediaArchive {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    /// Stores `body` under `media/{user_id}/{uuid}.{ext}` and returns the key.
    pub async fn archive(&self, user_id: Uuid, body: Bytes, content_type: &str) -> anyhow::Result<String> {
        let ext = ext_from_mime(content_type).unwrap_or("bin");
        let key = format!("media/{}/{}.{}", user_id, Uuid::new_v4(), ext);
        self.storage
            .put_object(&key, body, content_type)
            .await
            .with_context(|| format!("archive media {key}"))?;
        Ok(key)
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "audio/ogg" | "audio/opus" => Some("ogg"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}
