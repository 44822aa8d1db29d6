//! LLM-backed structured nutrition estimates for a meal description.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::dto::{ChatMessage, ChatRequest, ToolDefinition};
use crate::llm::ChatClient;

pub const ESTIMATION_SOURCE: &str = "llm_estimate";
pub const CLASSIFICATION_VERSION: &str = "meal-analysis-v1";
const FUNCTION_NAME: &str = "record_meal_analysis";
const MAX_NOTE_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NutrientRange {
    pub min: f64,
    pub max: f64,
    pub confidence: f64,
}

impl NutrientRange {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Nutrition {
    pub calories: Option<NutrientRange>,
    pub protein_g: Option<NutrientRange>,
    pub carbs_g: Option<NutrientRange>,
    pub fat_g: Option<NutrientRange>,
    pub fiber_g: Option<NutrientRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FlagEstimate {
    pub value: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProcessingLevel {
    pub value: u8,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarbsQuality {
    Refined,
    Whole,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CarbsQualityEstimate {
    pub value: CarbsQuality,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Categories {
    pub veggies: FlagEstimate,
    pub junk: FlagEstimate,
    pub homemade: FlagEstimate,
    pub processing_level: Option<ProcessingLevel>,
    pub carbs_quality: Option<CarbsQualityEstimate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Ingredient {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortionSize {
    Small,
    Medium,
    Large,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MealAnalysis {
    pub nutrition: Nutrition,
    pub categories: Categories,
    pub ingredients: Vec<Ingredient>,
    pub meal_type: MealType,
    pub portion_size: PortionSize,
    pub dietary_flags: Option<Vec<String>>,
    pub overall_confidence: f64,
    pub note: Option<String>,
    #[serde(default)]
    pub estimation_source: String,
    #[serde(default)]
    pub classification_version: String,
}

fn unit_interval(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

impl MealAnalysis {
    /// Rejects anything outside the schema's numeric contract.
    pub fn validate(&self) -> Result<(), String> {
        if !unit_interval(self.overall_confidence) {
            return Err(format!("overall_confidence {} out of range", self.overall_confidence));
        }
        let n = &self.nutrition;
        for (name, range) in [
            ("calories", &n.calories),
            ("protein_g", &n.protein_g),
            ("carbs_g", &n.carbs_g),
            ("fat_g", &n.fat_g),
            ("fiber_g", &n.fiber_g),
        ] {
            if let Some(r) = range {
                if !unit_interval(r.confidence) {
                    return Err(format!("{name}.confidence {} out of range", r.confidence));
                }
                if !r.min.is_finite() || !r.max.is_finite() || r.min < 0.0 || r.max < r.min {
                    return Err(format!("{name} range {}..{} invalid", r.min, r.max));
                }
            }
        }
        let c = &self.categories;
        for (name, conf) in [
            ("veggies", c.veggies.confidence),
            ("junk", c.junk.confidence),
            ("homemade", c.homemade.confidence),
        ] {
            if !unit_interval(conf) {
                return Err(format!("categories.{name}.confidence {conf} out of range"));
            }
        }
        if let Some(level) = &c.processing_level {
            if !(1..=4).contains(&level.value) || !unit_interval(level.confidence) {
                return Err("categories.processing_level invalid".into());
            }
        }
        if let Some(q) = &c.carbs_quality {
            if !unit_interval(q.confidence) {
                return Err("categories.carbs_quality.confidence out of range".into());
            }
        }
        for ing in &self.ingredients {
            if ing.name.trim().is_empty() || !unit_interval(ing.confidence) {
                return Err(format!("ingredient {:?} invalid", ing.name));
            }
        }
        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_CHARS {
                return Err("note longer than 100 chars".into());
            }
        }
        Ok(())
    }
}

/// Parses and validates a raw function-call payload. Any defect yields `None`.
pub fn parse_analysis(arguments: &str) -> Option<MealAnalysis> {
    let mut analysis: MealAnalysis = match serde_json::from_str(arguments) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "meal analysis did not match schema");
            return None;
        }
    };
    if let Err(reason) = analysis.validate() {
        warn!(%reason, "meal analysis failed validation");
        return None;
    }
    analysis.estimation_source = ESTIMATION_SOURCE.to_string();
    analysis.classification_version = CLASSIFICATION_VERSION.to_string();
    Some(analysis)
}

const SYSTEM_PROMPT: &str = "You are a nutrition analyst. Estimate the nutrition of the meal the \
user describes and call record_meal_analysis exactly once. Give every estimate as a min/max range \
with a confidence between 0 and 1. If you cannot estimate a value with reasonable confidence, \
return null for it rather than guess. Keep the note under 100 characters.";

fn range_schema() -> serde_json::Value {
    json!({
        "type": ["object", "null"],
        "properties": {
            "min": { "type": "number", "minimum": 0 },
            "max": { "type": "number", "minimum": 0 },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        },
        "required": ["min", "max", "confidence"],
        "additionalProperties": false
    })
}

fn flag_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "value": { "type": "boolean" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        },
        "required": ["value", "confidence"],
        "additionalProperties": false
    })
}

pub fn analysis_function() -> ToolDefinition {
    ToolDefinition::function(
        FUNCTION_NAME,
        "Record structured nutrition estimates for a meal",
        json!({
            "type": "object",
            "properties": {
                "nutrition": {
                    "type": "object",
                    "properties": {
                        "calories": range_schema(),
                        "protein_g": range_schema(),
                        "carbs_g": range_schema(),
                        "fat_g": range_schema(),
                        "fiber_g": range_schema()
                    },
                    "required": ["calories", "protein_g", "carbs_g", "fat_g", "fiber_g"],
                    "additionalProperties": false
                },
                "categories": {
                    "type": "object",
                    "properties": {
                        "veggies": flag_schema(),
                        "junk": flag_schema(),
                        "homemade": flag_schema(),
                        "processing_level": {
                            "type": ["object", "null"],
                            "properties": {
                                "value": { "type": "integer", "minimum": 1, "maximum": 4 },
                                "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                            },
                            "required": ["value", "confidence"]
                        },
                        "carbs_quality": {
                            "type": ["object", "null"],
                            "properties": {
                                "value": { "type": "string", "enum": ["refined", "whole", "mixed"] },
                                "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                            },
                            "required": ["value", "confidence"]
                        }
                    },
                    "required": ["veggies", "junk", "homemade"],
                    "additionalProperties": false
                },
                "ingredients": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                        },
                        "required": ["name", "confidence"]
                    }
                },
                "meal_type": { "type": "string", "enum": ["breakfast", "lunch", "dinner", "snack", "unknown"] },
                "portion_size": { "type": "string", "enum": ["small", "medium", "large", "unknown"] },
                "dietary_flags": { "type": ["array", "null"], "items": { "type": "string" } },
                "overall_confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                "note": { "type": ["string", "null"], "maxLength": 100 }
            },
            "required": ["nutrition", "categories", "ingredients", "meal_type", "portion_size", "overall_confidence"],
            "additionalProperties": false
        }),
    )
}

#[derive(Clone)]
pub struct LlmMealAnalyzer {
    chat: Arc<dyn ChatClient>,
    model: String,
}

impl LlmMealAnalyzer {
    pub fn new(chat: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    /// `None` on transport, schema or validation failure; never a partial analysis.
    pub async fn analyze(&self, meal_text: &str) -> Option<MealAnalysis> {
        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(meal_text)],
        );
        request.tools = vec![analysis_function()];
        request.tool_choice = Some(json!({ "type": "function", "function": { "name": FUNCTION_NAME } }));
        request.temperature = Some(0.2);

        let response = match self.chat.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "meal analysis request failed");
                return None;
            }
        };
        let call = response
            .first_message()
            .and_then(|m| m.tool_calls.first())
            .filter(|c| c.function.name == FUNCTION_NAME);
        let Some(call) = call else {
            debug!("meal analysis returned no function call");
            return None;
        };
        parse_analysis(&call.function.arguments)
    }
}
