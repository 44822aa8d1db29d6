use serde_json::json;

use crate::llm::dto::ToolDefinition;
use crate::tools::args::ToolName;

fn definition(tool: ToolName) -> ToolDefinition {
    match tool {
        ToolName::SetPreferences => ToolDefinition::function(
            tool.as_str(),
            "Update the user's coaching preferences. Only include fields the user asked to change.",
            json!({
                "type": "object",
                "properties": {
                    "goal": { "type": "string", "enum": ["fat_loss", "muscle_gain", "maintenance", "general"] },
                    "tone": { "type": "string", "enum": ["friendly", "clinical", "funny"] },
                    "reportTime": {
                        "type": "string",
                        "pattern": "^([01]?[0-9]|2[0-3]):[0-5][0-9]$",
                        "description": "Daily report time, 24h HH:MM"
                    },
                    "focus": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["protein", "veggies", "carbs", "late_eating", "home_cooking"] }
                    },
                    "dietaryRestrictions": { "type": "array", "items": { "type": "string" } },
                    "storeMedia": { "type": "boolean" }
                },
                "additionalProperties": false
            }),
        ),
        ToolName::LogMeal => ToolDefinition::function(
            tool.as_str(),
            "Log something the user ate or drank.",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "minLength": 1, "description": "What was eaten" },
                    "when": { "type": "string", "format": "date-time", "description": "ISO-8601 time of the meal if not now" }
                },
                "required": ["text"],
                "additionalProperties": false
            }),
        ),
        ToolName::RequestSummary => ToolDefinition::function(
            tool.as_str(),
            "Send the user a nutrition summary.",
            json!({
                "type": "object",
                "properties": {
                    "period": { "type": "string", "enum": ["daily", "weekly"] },
                    "date": { "type": "string", "pattern": "^\\d{4}-\\d{2}-\\d{2}$" }
                },
                "required": ["period"],
                "additionalProperties": false
            }),
        ),
        ToolName::AskCoach => ToolDefinition::function(
            tool.as_str(),
            "Answer a general nutrition or coaching question.",
            json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "minLength": 1 }
                },
                "required": ["question"],
                "additionalProperties": false
            }),
        ),
    }
}

/// The four callable tools offered to the intent model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(definition).collect()
}
