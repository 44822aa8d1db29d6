use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

/// Append-only audit row; one per inbound and per outbound message.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub direction: String,
    pub payload: serde_json::Value,
}

impl MessageLog {
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(|v| v.as_str())
    }
}
