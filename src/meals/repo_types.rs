use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    Text,
    Image,
    Voice,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Text => "TEXT",
            SourceType::Image => "IMAGE",
            SourceType::Voice => "VOICE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(SourceType::Text),
            "IMAGE" => Some(SourceType::Image),
            "VOICE" => Some(SourceType::Voice),
            _ => None,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub source_type: String,
    pub raw_text: String,
    pub tags: serde_json::Value,
}

/// A logged meal. `tags` holds either keyword tags or an LLM analysis, or `{}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub source_type: SourceType,
    pub raw_text: String,
    pub tags: serde_json::Value,
}

impl TryFrom<MealRow> for Meal {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        let source_type = SourceType::parse(&r.source_type)
            .ok_or_else(|| anyhow::anyhow!("unknown source_type {:?} on meal {}", r.source_type, r.id))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            created_at: r.created_at,
            source_type,
            raw_text: r.raw_text,
            tags: r.tags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub source_type: SourceType,
    pub raw_text: String,
    pub tags: serde_json::Value,
}
