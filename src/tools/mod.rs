pub mod args;
mod ask_coach;
mod log_meal;
mod request_summary;
pub mod schema;
mod set_preferences;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, warn};

use crate::meals::SourceType;
use crate::store::Store;
use crate::summary::SummaryComposer;
use crate::users::User;

pub use args::{ToolArgs, ToolName};
pub use ask_coach::AskCoachTool;
pub use log_meal::{LogMealTool, MealEnricher};
pub use request_summary::RequestSummaryTool;
pub use set_preferences::SetPreferencesTool;

pub const UNKNOWN_TOOL_REPLY: &str = "I'm not sure how to help with that. Try logging a meal, \
     asking for your daily summary, or asking me a nutrition question.";

/// What a tool hands back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResponse {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ToolResponse {
    pub fn new(text: impl Into<String>, kind: &str) -> Self {
        Self {
            text: text.into(),
            kind: kind.to_string(),
        }
    }
}

/// Per-message facts a tool may need.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub user: &'a User,
    pub message_timestamp: OffsetDateTime,
    pub source: SourceType,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> ToolName;

    /// Fixed reply when arguments fail validation.
    fn apology(&self) -> &'static str;

    async fn handle(&self, args: ToolArgs, ctx: &ToolContext<'_>) -> anyhow::Result<ToolResponse>;
}

pub struct ToolDispatcher {
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
    offset: UtcOffset,
}

impl ToolDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        composer: SummaryComposer,
        enricher: MealEnricher,
        offset: UtcOffset,
    ) -> Self {
        let tools: [Arc<dyn ToolHandler>; 4] = [
            Arc::new(SetPreferencesTool::new(store.clone())),
            Arc::new(LogMealTool::new(store.clone(), enricher, offset)),
            Arc::new(RequestSummaryTool::new(store, composer, offset)),
            Arc::new(AskCoachTool),
        ];
        let handlers = tools
            .into_iter()
            .map(|t| (t.name().as_str(), t))
            .collect();
        Self { handlers, offset }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Runs one tool. Unknown names and invalid arguments become canned replies;
    /// only persistence failures surface as errors.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: &Value,
        ctx: &ToolContext<'_>,
    ) -> anyhow::Result<ToolResponse> {
        let Some(handler) = self.handlers.get(tool_name) else {
            warn!(tool = %tool_name, user_id = %ctx.user.id, "unknown tool requested");
            return Ok(ToolResponse::new(UNKNOWN_TOOL_REPLY, "unknown_tool"));
        };

        let parsed = match ToolArgs::parse(handler.name(), args, self.offset) {
            Ok(a) => a,
            Err(e) => {
                warn!(tool = %tool_name, user_id = %ctx.user.id, error = %e, "invalid tool arguments");
                return Ok(ToolResponse::new(handler.apology(), "error"));
            }
        };

        let response = handler.handle(parsed, ctx).await?;
        info!(tool = %tool_name, user_id = %ctx.user.id, kind = %response.kind, "tool executed");
        Ok(response)
    }
}

/// Replies when a handler receives another tool's arguments; never expected in practice.
fn mismatched(handler: &dyn ToolHandler, args: &ToolArgs) -> ToolResponse {
    warn!(tool = handler.name().as_str(), ?args, "handler received foreign arguments");
    ToolResponse::new(handler.apology(), "error")
}
