use std::sync::Arc;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::media::{MediaKind, MediaPipeline};
use crate::meals::SourceType;
use crate::messages::{send_and_log, Direction};
use crate::messaging::{IncomingMessage, MessageKind, MessagingProvider};
use crate::routing::{IntentRouter, RoutingContext, RoutingResult};
use crate::store::Store;
use crate::tools::{ToolContext, ToolDispatcher, ToolResponse};

pub const MAX_TEXT_CHARS: usize = 1000;
pub const TOO_LONG_REPLY: &str =
    "Sorry, your message is too long. Please keep it under 1000 characters.";
pub const MEDIA_ERROR_REPLY: &str =
    "Sorry, I couldn't process that media. Please try sending it again or describe your meal in text.";
pub const INTERNAL_ERROR_REPLY: &str =
    "Sorry, something went wrong on my side. Please try again in a moment.";

/// How one inbound message was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied { kind: String },
    TooLong,
}

pub struct MessagePipeline {
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessagingProvider>,
    router: Arc<dyn IntentRouter>,
    dispatcher: ToolDispatcher,
    media: MediaPipeline,
    default_language: String,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn MessagingProvider>,
        router: Arc<dyn IntentRouter>,
        dispatcher: ToolDispatcher,
        media: MediaPipeline,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            store,
            messenger,
            router,
            dispatcher,
            media,
            default_language: default_language.into(),
        }
    }

    /// Runs one message end to end. Errors are persistence failures only.
    #[instrument(skip_all, fields(from = %msg.from, kind = ?msg.kind))]
    pub async fn handle(&self, msg: &IncomingMessage) -> anyhow::Result<Outcome> {
        let at = msg.timestamp;

        if msg.kind == MessageKind::Text
            && msg.text.as_deref().is_some_and(|t| t.chars().count() > MAX_TEXT_CHARS)
        {
            warn!("message over length limit");
            send_and_log(
                self.store.as_ref(),
                self.messenger.as_ref(),
                None,
                &msg.from,
                TOO_LONG_REPLY,
                "error",
                at,
            )
            .await?;
            return Ok(Outcome::TooLong);
        }

        let user = self
            .store
            .find_or_create_user(&msg.from, &self.default_language)
            .await
            .context("find or create user")?;
        self.store
            .append_message_log(Some(user.id), Direction::In, serde_json::to_value(msg)?, at)
            .await?;

        let (text, source) = match &msg.media_url {
            Some(url) => {
                match self
                    .media
                    .process_media(url, msg.mime_type.as_deref(), msg.text.as_deref(), Some(&user))
                    .await
                {
                    Ok(processed) => {
                        let source = match processed.kind {
                            MediaKind::Audio => SourceType::Voice,
                            MediaKind::Image => SourceType::Image,
                        };
                        (processed.text, source)
                    }
                    Err(e) => {
                        warn!(user_id = %user.id, error = %e, "media processing failed");
                        let reply = ToolResponse::new(MEDIA_ERROR_REPLY, "media_error");
                        return self.reply(user.id, &msg.from, reply, at).await;
                    }
                }
            }
            None => (msg.text.clone().unwrap_or_default(), SourceType::Text),
        };

        let context = self
            .store
            .get_preferences(user.id)
            .await?
            .map(|p| RoutingContext::from(&p))
            .unwrap_or_default();

        let response = match self.router.route(&text, &context).await {
            RoutingResult::Tool { name, args } => {
                let ctx = ToolContext {
                    user: &user,
                    message_timestamp: at,
                    source,
                };
                self.dispatcher.execute(&name, &args, &ctx).await?
            }
            RoutingResult::Reply { text } => ToolResponse::new(text, "reply"),
        };
        self.reply(user.id, &msg.from, response, at).await
    }

    async fn reply(
        &self,
        user_id: Uuid,
        to: &str,
        response: ToolResponse,
        at: OffsetDateTime,
    ) -> anyhow::Result<Outcome> {
        let sent = send_and_log(
            self.store.as_ref(),
            self.messenger.as_ref(),
            Some(user_id),
            to,
            &response.text,
            &response.kind,
            at,
        )
        .await?;
        info!(%user_id, kind = %response.kind, delivered = sent.success, "reply sent");
        Ok(Outcome::Replied { kind: response.kind })
    }

    /// Best-effort apology after an unhandled failure. The OUT row is attached to the
    /// sender when the store can still resolve them; failures here are only logged.
    pub async fn apologize(&self, msg: &IncomingMessage) {
        let user_id = match self
            .store
            .find_or_create_user(&msg.from, &self.default_language)
            .await
        {
            Ok(user) => Some(user.id),
            Err(e) => {
                warn!(error = %e, "could not resolve user for apology");
                None
            }
        };
        if let Err(e) = send_and_log(
            self.store.as_ref(),
            self.messenger.as_ref(),
            user_id,
            &msg.from,
            INTERNAL_ERROR_REPLY,
            "error",
            msg.timestamp,
        )
        .await
        {
            warn!(error = %e, to = %msg.from, "apology not logged");
        }
    }
}
