use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::llm::dto::{ChatMessage, ChatRequest, ContentPart, ImageUrl};
use crate::llm::{ChatClient, LlmError};

const SYSTEM_PROMPT: &str = "You describe photos of food for a nutrition diary. List every food \
and drink you can see, with cooking method and an estimated portion size for each (grams, \
pieces or cups). Mention sauces, dressings, oils and sides. If something is unclear, say what it \
most likely is. Reply with a single plain-text description, no preamble.";

/// Describes an image in words.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(
        &self,
        image: &Bytes,
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<String, LlmError>;
}

pub struct LlmVisionDescriber {
    chat: Arc<dyn ChatClient>,
    model: String,
}

impl LlmVisionDescriber {
    pub fn new(chat: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

/// Inline data URL; provider media URLs need credentials the model does not have.
fn data_url(image: &Bytes, mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(image))
}

#[async_trait]
impl VisionDescriber for LlmVisionDescriber {
    async fn describe(
        &self,
        image: &Bytes,
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(caption) = caption {
            parts.push(ContentPart::Text {
                text: format!("The user wrote: {caption}"),
            });
        }
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: data_url(image, mime_type),
            },
        });

        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user_parts(parts)],
        );
        request.max_tokens = Some(500);

        let response = self.chat.complete(&request).await?;
        let text = response
            .first_message()
            .and_then(|m| m.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::Other("vision model returned no description".into()));
        }
        Ok(text.to_string())
    }
}
