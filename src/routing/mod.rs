//! Turns free user text into either a tool call or a plain reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::llm::dto::{ChatMessage, ChatRequest};
use crate::llm::ChatClient;
use crate::tools::schema::tool_definitions;
use crate::tools::ToolName;
use crate::users::Preferences;

pub const DEFAULT_REPLY: &str =
    "I'm here to help with your nutrition! Tell me what you ate or ask me a question.";

const SYSTEM_PROMPT: &str = "You are a friendly WhatsApp nutrition coach. \
Pick exactly one tool for every message: set_preferences when the user wants to change their \
goal, tone, report time, focus areas, dietary restrictions or media storage; log_meal when they \
describe something they ate or drank; request_summary when they ask for a summary or report; \
ask_coach for any nutrition question. Only include arguments the user actually gave.";

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingResult {
    Tool { name: String, args: Value },
    Reply { text: String },
}

impl RoutingResult {
    /// What the router returns when the model could not be used.
    pub fn fallback(text: &str) -> Self {
        RoutingResult::Tool {
            name: ToolName::AskCoach.as_str().to_string(),
            args: json!({ "question": text }),
        }
    }
}

/// Preference fields that help the model resolve a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingContext {
    pub goal: Option<String>,
    pub tone: Option<String>,
    pub report_time: Option<String>,
    pub focus: Option<Vec<String>>,
}

impl From<&Preferences> for RoutingContext {
    fn from(p: &Preferences) -> Self {
        Self {
            goal: Some(p.goal.as_str().to_string()),
            tone: Some(p.tone.as_str().to_string()),
            report_time: Some(p.report_time.clone()),
            focus: Some(p.focus.iter().map(|f| f.as_str().to_string()).collect()),
        }
    }
}

impl RoutingContext {
    /// Deterministic one-line summary of the present fields.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(goal) = &self.goal {
            parts.push(format!("goal={goal}"));
        }
        if let Some(tone) = &self.tone {
            parts.push(format!("tone={tone}"));
        }
        if let Some(time) = &self.report_time {
            parts.push(format!("reportTime={time}"));
        }
        if let Some(focus) = &self.focus {
            if !focus.is_empty() {
                parts.push(format!("focus={}", focus.join(",")));
            }
        }
        if parts.is_empty() {
            "User preferences: none set".to_string()
        } else {
            format!("User preferences: {}", parts.join("; "))
        }
    }
}

#[async_trait]
pub trait IntentRouter: Send + Sync {
    /// Never fails; remote problems turn into [`RoutingResult::fallback`].
    async fn route(&self, text: &str, context: &RoutingContext) -> RoutingResult;
}

pub struct LlmIntentRouter {
    chat: Arc<dyn ChatClient>,
    model: String,
}

impl LlmIntentRouter {
    pub fn new(chat: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    fn request(&self, text: &str, context: &RoutingContext) -> ChatRequest {
        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::system(context.summary()),
                ChatMessage::user(text),
            ],
        );
        request.tools = tool_definitions();
        request.tool_choice = Some(json!("auto"));
        request.temperature = Some(0.0);
        request
    }
}

#[async_trait]
impl IntentRouter for LlmIntentRouter {
    async fn route(&self, text: &str, context: &RoutingContext) -> RoutingResult {
        let response = match self.chat.complete(&self.request(text, context)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "intent routing failed, falling back to ask_coach");
                return RoutingResult::fallback(text);
            }
        };
        let Some(message) = response.first_message() else {
            warn!("intent routing returned no message, falling back to ask_coach");
            return RoutingResult::fallback(text);
        };

        if let Some(call) = message.tool_calls.first() {
            if message.tool_calls.len() > 1 {
                debug!(count = message.tool_calls.len(), "ignoring extra tool calls");
            }
            let raw = call.function.arguments.trim();
            let args = if raw.is_empty() {
                Ok(json!({}))
            } else {
                serde_json::from_str::<Value>(raw)
            };
            return match args {
                Ok(args) => RoutingResult::Tool {
                    name: call.function.name.clone(),
                    args,
                },
                Err(e) => {
                    warn!(error = %e, tool = %call.function.name, "malformed tool arguments, falling back to ask_coach");
                    RoutingResult::fallback(text)
                }
            };
        }

        let reply = message.content.as_deref().map(str::trim).unwrap_or_default();
        RoutingResult::Reply {
            text: if reply.is_empty() { DEFAULT_REPLY.to_string() } else { reply.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    #[test]
    fn context_summary_lists_present_fields_only() {
        assert_eq!(RoutingContext::default().summary(), "User preferences: none set");
        let ctx = RoutingContext {
            goal: Some("fat_loss".into()),
            focus: Some(vec!["protein".into(), "veggies".into()]),
            ..Default::default()
        };
        assert_eq!(ctx.summary(), "User preferences: goal=fat_loss; focus=protein,veggies");
    }

    #[tokio::test]
    async fn tool_call_is_returned_with_parsed_args() {
        let chat = Arc::new(ScriptedChat::tool_call("set_preferences", json!({ "goal": "fat_loss" })));
        let router = LlmIntentRouter::new(chat.clone(), "test-model");
        let result = router.route("set goal: fat_loss", &RoutingContext::default()).await;
        assert_eq!(
            result,
            RoutingResult::Tool {
                name: "set_preferences".into(),
                args: json!({ "goal": "fat_loss" }),
            }
        );

        let sent = chat.requests();
        assert_eq!(sent[0].tools.len(), 4);
        assert_eq!(sent[0].tool_choice, Some(json!("auto")));
    }

    #[tokio::test]
    async fn transport_error_falls_back_to_ask_coach() {
        let router = LlmIntentRouter::new(Arc::new(ScriptedChat::failing()), "test-model");
        let result = router.route("is rice healthy?", &RoutingContext::default()).await;
        assert_eq!(result, RoutingResult::fallback("is rice healthy?"));
    }

    #[tokio::test]
    async fn malformed_arguments_fall_back() {
        let chat = ScriptedChat::raw_tool_call("log_meal", "{not json");
        let router = LlmIntentRouter::new(Arc::new(chat), "test-model");
        let result = router.route("pasta", &RoutingContext::default()).await;
        assert_eq!(result, RoutingResult::fallback("pasta"));
    }

    #[tokio::test]
    async fn empty_text_reply_gets_default() {
        let router = LlmIntentRouter::new(Arc::new(ScriptedChat::text("  ")), "test-model");
        let result = router.route("hi", &RoutingContext::default()).await;
        assert_eq!(result, RoutingResult::Reply { text: DEFAULT_REPLY.into() });

        let router = LlmIntentRouter::new(Arc::new(ScriptedChat::text("Hello there!")), "test-model");
        let result = router.route("hi", &RoutingContext::default()).await;
        assert_eq!(result, RoutingResult::Reply { text: "Hello there!".into() });
    }

    #[tokio::test]
    async fn missing_message_falls_back() {
        let router = LlmIntentRouter::new(Arc::new(ScriptedChat::empty()), "test-model");
        let result = router.route("hello", &RoutingContext::default()).await;
        assert_eq!(result, RoutingResult::fallback("hello"));
    }
}
