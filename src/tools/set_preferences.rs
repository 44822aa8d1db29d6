use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::args::{SetPreferences, ToolArgs, ToolName};
use super::{mismatched, ToolContext, ToolHandler, ToolResponse};
use crate::store::Store;

pub(super) const APOLOGY: &str =
    "Sorry, I couldn't update your preferences. Please check the values and try again.";
const NOTHING_TO_UPDATE: &str = "Tell me what you'd like to change: goal, tone, report time, \
     focus or dietary restrictions.";

pub struct SetPreferencesTool {
    store: Arc<dyn Store>,
}

impl SetPreferencesTool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

/// Lists exactly the fields present in `args`, in a fixed order.
fn confirmation(args: &SetPreferences) -> String {
    let u = &args.update;
    let mut lines = Vec::new();
    if let Some(goal) = u.goal {
        lines.push(format!("goal: {goal}"));
    }
    if let Some(tone) = u.tone {
        lines.push(format!("tone: {tone}"));
    }
    if let Some(time) = &u.report_time {
        lines.push(format!("reportTime: {time}"));
    }
    if let Some(focus) = &u.focus {
        let names: Vec<&str> = focus.iter().map(|f| f.as_str()).collect();
        let shown = if names.is_empty() { "none".to_string() } else { names.join(", ") };
        lines.push(format!("focus: {shown}"));
    }
    if let Some(restrictions) = &u.dietary_restrictions {
        let shown = if restrictions.is_empty() { "none".to_string() } else { restrictions.join(", ") };
        lines.push(format!("dietaryRestrictions: {shown}"));
    }
    if let Some(store_media) = args.store_media {
        lines.push(format!("storeMedia: {}", if store_media { "on" } else { "off" }));
    }

    let mut text = String::from("✅ Preferences updated:");
    for line in lines {
        text.push_str("\n• ");
        text.push_str(&line);
    }
    text
}

#[async_trait]
impl ToolHandler for SetPreferencesTool {
    fn name(&self) -> ToolName {
        ToolName::SetPreferences
    }

    fn apology(&self) -> &'static str {
        APOLOGY
    }

    #[instrument(skip_all, fields(user_id = %ctx.user.id))]
    async fn handle(&self, args: ToolArgs, ctx: &ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let args = match args {
            ToolArgs::SetPreferences(a) => a,
            other => return Ok(mismatched(self, &other)),
        };
        if args.update.is_empty() && args.store_media.is_none() {
            return Ok(ToolResponse::new(NOTHING_TO_UPDATE, "preferences_unchanged"));
        }

        if !args.update.is_empty() {
            self.store.update_preferences(ctx.user.id, &args.update).await?;
        }
        if let Some(store_media) = args.store_media {
            self.store.set_store_media(ctx.user.id, store_media).await?;
        }
        Ok(ToolResponse::new(confirmation(&args), "preferences_updated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::SourceType;
    use crate::testing::MemoryStore;
    use crate::users::{FocusArea, Goal, Tone};
    use serde_json::json;
    use time::{OffsetDateTime, UtcOffset};

    async fn run(store: &Arc<MemoryStore>, phone: &str, raw: serde_json::Value) -> ToolResponse {
        let user = store.find_or_create_user(phone, "en").await.unwrap();
        let tool = SetPreferencesTool::new(store.clone());
        let ctx = ToolContext {
            user: &user,
            message_timestamp: OffsetDateTime::UNIX_EPOCH,
            source: SourceType::Text,
        };
        let args = ToolArgs::parse(ToolName::SetPreferences, &raw, UtcOffset::UTC).unwrap();
        tool.handle(args, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn goal_update_is_confirmed_and_persisted() {
        let store = Arc::new(MemoryStore::default());
        let r = run(&store, "+15550200000", json!({ "goal": "fat_loss" })).await;
        assert_eq!(r.kind, "preferences_updated");
        assert_eq!(r.text, "✅ Preferences updated:\n• goal: fat_loss");

        let user = store.find_or_create_user("+15550200000", "en").await.unwrap();
        let prefs = store.get_preferences(user.id).await.unwrap().unwrap();
        assert_eq!(prefs.goal, Goal::FatLoss);
        assert_eq!(prefs.tone, Tone::Friendly);
        assert_eq!(prefs.report_time, "21:00");
    }

    #[tokio::test]
    async fn confirmation_follows_fixed_field_order() {
        let store = Arc::new(MemoryStore::default());
        let r = run(
            &store,
            "+15550200001",
            json!({
                "storeMedia": true,
                "dietaryRestrictions": ["vegan"],
                "focus": ["protein", "veggies"],
                "reportTime": "7:30",
                "tone": "funny",
                "goal": "muscle_gain"
            }),
        )
        .await;
        assert_eq!(
            r.text,
            "✅ Preferences updated:\n• goal: muscle_gain\n• tone: funny\n• reportTime: 07:30\
             \n• focus: protein, veggies\n• dietaryRestrictions: vegan\n• storeMedia: on"
        );
        let user = store.find_or_create_user("+15550200001", "en").await.unwrap();
        assert!(user.store_media);
        let prefs = store.get_preferences(user.id).await.unwrap().unwrap();
        assert_eq!(prefs.focus, vec![FocusArea::Protein, FocusArea::Veggies]);
    }

    #[tokio::test]
    async fn applying_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let args = json!({ "tone": "clinical", "focus": ["late_eating"] });
        run(&store, "+15550200002", args.clone()).await;
        let user = store.find_or_create_user("+15550200002", "en").await.unwrap();
        let mut once = store.get_preferences(user.id).await.unwrap().unwrap();
        run(&store, "+15550200002", args).await;
        let mut twice = store.get_preferences(user.id).await.unwrap().unwrap();
        once.updated_at = OffsetDateTime::UNIX_EPOCH;
        twice.updated_at = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn empty_arguments_change_nothing() {
        let store = Arc::new(MemoryStore::default());
        let r = run(&store, "+15550200003", json!({})).await;
        assert_eq!(r.kind, "preferences_unchanged");
    }
}
