use std::sync::Arc;

use async_trait::async_trait;
use time::UtcOffset;
use tracing::instrument;

use super::args::{Period, ToolArgs, ToolName};
use super::{mismatched, ToolContext, ToolHandler, ToolResponse};
use crate::store::Store;
use crate::summary::{format_summary_text, SummaryComposer};

pub(super) const APOLOGY: &str =
    "Sorry, I couldn't prepare your summary. Try asking for a daily or weekly summary.";
pub const WEEKLY_COMING_SOON: &str =
    "📅 Weekly summaries are coming soon! For now, ask me for your daily summary.";

pub struct RequestSummaryTool {
    store: Arc<dyn Store>,
    composer: SummaryComposer,
    offset: UtcOffset,
}

impl RequestSummaryTool {
    pub fn new(store: Arc<dyn Store>, composer: SummaryComposer, offset: UtcOffset) -> Self {
        Self {
            store,
            composer,
            offset,
        }
    }
}

#[async_trait]
impl ToolHandler for RequestSummaryTool {
    fn name(&self) -> ToolName {
        ToolName::RequestSummary
    }

    fn apology(&self) -> &'static str {
        APOLOGY
    }

    #[instrument(skip_all, fields(user_id = %ctx.user.id))]
    async fn handle(&self, args: ToolArgs, ctx: &ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let args = match args {
            ToolArgs::RequestSummary(a) => a,
            other => return Ok(mismatched(self, &other)),
        };
        if args.period == Period::Weekly {
            return Ok(ToolResponse::new(WEEKLY_COMING_SOON, "summary"));
        }

        let date = args
            .date
            .unwrap_or_else(|| ctx.message_timestamp.to_offset(self.offset).date());
        let summary = self.composer.compose(ctx.user.id, date).await?;
        let tone = self
            .store
            .get_preferences(ctx.user.id)
            .await?
            .map(|p| p.tone)
            .unwrap_or_default();
        Ok(ToolResponse::new(format_summary_text(&summary, tone), "summary"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::SourceType;
    use crate::testing::MemoryStore;
    use crate::users::{PreferencesUpdate, Tone};
    use serde_json::json;
    use time::macros::datetime;

    #[tokio::test]
    async fn daily_summary_uses_message_day_and_tone() {
        let store = Arc::new(MemoryStore::default());
        let user = store.find_or_create_user("+15550400000", "en").await.unwrap();
        store
            .update_preferences(
                user.id,
                &PreferencesUpdate {
                    tone: Some(Tone::Clinical),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let tool = RequestSummaryTool::new(
            store.clone(),
            SummaryComposer::new(store.clone(), UtcOffset::UTC),
            UtcOffset::UTC,
        );
        let ctx = ToolContext {
            user: &user,
            message_timestamp: datetime!(2026-06-01 20:00 UTC),
            source: SourceType::Text,
        };
        let args = ToolArgs::parse(ToolName::RequestSummary, &json!({ "period": "daily" }), UtcOffset::UTC)
            .unwrap();
        let r = tool.handle(args, &ctx).await.unwrap();
        assert_eq!(r.kind, "summary");
        assert!(r.text.starts_with("📊 Daily Nutrition Report (2026-06-01)"));
        assert!(r.text.contains("Meals logged: 0"));
        assert!(r.text.contains("Remember to log your meals tomorrow!"));
    }

    #[tokio::test]
    async fn weekly_is_not_built_yet() {
        let store = Arc::new(MemoryStore::default());
        let user = store.find_or_create_user("+15550400001", "en").await.unwrap();
        let tool = RequestSummaryTool::new(
            store.clone(),
            SummaryComposer::new(store.clone(), UtcOffset::UTC),
            UtcOffset::UTC,
        );
        let ctx = ToolContext {
            user: &user,
            message_timestamp: datetime!(2026-06-01 20:00 UTC),
            source: SourceType::Text,
        };
        let args = ToolArgs::parse(ToolName::RequestSummary, &json!({ "period": "weekly" }), UtcOffset::UTC)
            .unwrap();
        let r = tool.handle(args, &ctx).await.unwrap();
        assert_eq!(r.text, WEEKLY_COMING_SOON);
    }
}
