use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use time::UtcOffset;
use tracing::{info, instrument, warn};

use super::args::{ToolArgs, ToolName};
use super::{mismatched, ToolContext, ToolHandler, ToolResponse};
use crate::meals::analyzer::LlmMealAnalyzer;
use crate::meals::hints::generate_hint;
use crate::meals::tagger::tag_meal;
use crate::meals::{is_late_hour, MealSignals, NewMeal};
use crate::store::Store;
use crate::users::Preferences;

pub(super) const APOLOGY: &str =
    "Sorry, I couldn't log that meal. Please describe what you ate and try again.";
pub const ANALYSIS_UNAVAILABLE: &str =
    "✅ Meal logged! Nutrition analysis is unavailable right now, but your meal was saved.";

/// How meal text becomes the stored `tags` blob. One variant per deployment.
pub enum MealEnricher {
    Keywords,
    Llm(LlmMealAnalyzer),
}

impl MealEnricher {
    /// Returns the blob to store and, when enrichment worked, its signals.
    async fn enrich(&self, text: &str, local_hour: u8) -> anyhow::Result<(Value, Option<MealSignals>)> {
        match self {
            MealEnricher::Keywords => {
                let tags = tag_meal(text, local_hour);
                Ok((serde_json::to_value(&tags)?, Some(MealSignals::from(&tags))))
            }
            MealEnricher::Llm(analyzer) => match analyzer.analyze(text).await {
                Some(analysis) => Ok((
                    serde_json::to_value(&analysis)?,
                    Some(MealSignals::from(&analysis)),
                )),
                None => Ok((json!({}), None)),
            },
        }
    }
}

pub struct LogMealTool {
    store: Arc<dyn Store>,
    enricher: MealEnricher,
    offset: UtcOffset,
}

impl LogMealTool {
    pub fn new(store: Arc<dyn Store>, enricher: MealEnricher, offset: UtcOffset) -> Self {
        Self {
            store,
            enricher,
            offset,
        }
    }
}

#[async_trait]
impl ToolHandler for LogMealTool {
    fn name(&self) -> ToolName {
        ToolName::LogMeal
    }

    fn apology(&self) -> &'static str {
        APOLOGY
    }

    #[instrument(skip_all, fields(user_id = %ctx.user.id))]
    async fn handle(&self, args: ToolArgs, ctx: &ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let args = match args {
            ToolArgs::LogMeal(a) => a,
            other => return Ok(mismatched(self, &other)),
        };
        let eaten_at = args.when.unwrap_or(ctx.message_timestamp);
        let local_hour = eaten_at.to_offset(self.offset).hour();

        let (tags, signals) = self.enricher.enrich(&args.text, local_hour).await?;
        let meal = self
            .store
            .insert_meal(NewMeal {
                user_id: ctx.user.id,
                created_at: eaten_at,
                source_type: ctx.source,
                raw_text: args.text,
                tags,
            })
            .await?;
        info!(meal_id = %meal.id, source = meal.source_type.as_str(), "meal logged");

        let Some(signals) = signals else {
            warn!(meal_id = %meal.id, "meal saved without analysis");
            return Ok(ToolResponse::new(ANALYSIS_UNAVAILABLE, "meal_logged"));
        };

        let prefs = match self.store.get_preferences(ctx.user.id).await? {
            Some(p) => p,
            None => Preferences::defaults(ctx.user.id, eaten_at),
        };
        let late = is_late_hour(local_hour, prefs.late_hour());
        let hint = generate_hint(prefs.goal, prefs.tone, &prefs.focus, &signals, late);
        Ok(ToolResponse::new(format!("✅ Meal logged!\n💡 {hint}"), "meal_logged"))
    }
}
