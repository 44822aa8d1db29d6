use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A WhatsApp user, keyed by their E.164 phone number.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub language: String,
    pub store_media: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    FatLoss,
    MuscleGain,
    Maintenance,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Friendly,
    Clinical,
    Funny,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    Protein,
    Veggies,
    Carbs,
    LateEating,
    HomeCooking,
}

impl Goal {
    pub fn as_str(self) -> &'static str {
        match self {
            Goal::FatLoss => "fat_loss",
            Goal::MuscleGain => "muscle_gain",
            Goal::Maintenance => "maintenance",
            Goal::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fat_loss" => Some(Goal::FatLoss),
            "muscle_gain" => Some(Goal::MuscleGain),
            "maintenance" => Some(Goal::Maintenance),
            "general" => Some(Goal::General),
            _ => None,
        }
    }
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Friendly => "friendly",
            Tone::Clinical => "clinical",
            Tone::Funny => "funny",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "friendly" => Some(Tone::Friendly),
            "clinical" => Some(Tone::Clinical),
            "funny" => Some(Tone::Funny),
            _ => None,
        }
    }
}

impl FocusArea {
    pub fn as_str(self) -> &'static str {
        match self {
            FocusArea::Protein => "protein",
            FocusArea::Veggies => "veggies",
            FocusArea::Carbs => "carbs",
            FocusArea::LateEating => "late_eating",
            FocusArea::HomeCooking => "home_cooking",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `preferences` row; JSON columns are decoded in [`Preferences::try_from`].
#[derive(Debug, FromRow)]
pub struct PreferencesRow {
    pub user_id: Uuid,
    pub goal: String,
    pub tone: String,
    pub report_time: String,
    pub report_format: String,
    pub focus: serde_json::Value,
    pub dietary_restrictions: serde_json::Value,
    pub thresholds: serde_json::Value,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Preferences {
    pub user_id: Uuid,
    pub goal: Goal,
    pub tone: Tone,
    pub report_time: String,
    pub report_format: String,
    pub focus: Vec<FocusArea>,
    pub dietary_restrictions: Vec<String>,
    pub thresholds: serde_json::Value,
    pub updated_at: OffsetDateTime,
}

pub const DEFAULT_REPORT_TIME: &str = "21:00";
pub const DEFAULT_LATE_HOUR: u8 = 21;

impl Preferences {
    pub fn defaults(user_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            user_id,
            goal: Goal::General,
            tone: Tone::Friendly,
            report_time: DEFAULT_REPORT_TIME.to_string(),
            report_format: "text".to_string(),
            focus: Vec::new(),
            dietary_restrictions: Vec::new(),
            thresholds: serde_json::json!({ "lateHour": DEFAULT_LATE_HOUR }),
            updated_at: now,
        }
    }

    /// `thresholds.lateHour`, clamped to a valid hour.
    pub fn late_hour(&self) -> u8 {
        self.thresholds
            .get("lateHour")
            .and_then(|v| v.as_u64())
            .filter(|h| *h < 24)
            .map(|h| h as u8)
            .unwrap_or(DEFAULT_LATE_HOUR)
    }

    /// `report_time` as (hour, minute); `None` if the stored value is malformed.
    pub fn report_hour_minute(&self) -> Option<(u8, u8)> {
        parse_report_time(&self.report_time)
    }
}

pub fn parse_report_time(raw: &str) -> Option<(u8, u8)> {
    let (h, m) = raw.split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hour: u8 = h.parse().ok()?;
    let minute: u8 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

impl TryFrom<PreferencesRow> for Preferences {
    type Error = anyhow::Error;

    fn try_from(r: PreferencesRow) -> Result<Self, Self::Error> {
        let goal = Goal::parse(&r.goal)
            .ok_or_else(|| anyhow::anyhow!("unknown goal {:?} for user {}", r.goal, r.user_id))?;
        let tone = Tone::parse(&r.tone)
            .ok_or_else(|| anyhow::anyhow!("unknown tone {:?} for user {}", r.tone, r.user_id))?;
        Ok(Self {
            user_id: r.user_id,
            goal,
            tone,
            report_time: r.report_time,
            report_format: r.report_format,
            focus: serde_json::from_value(r.focus)?,
            dietary_restrictions: serde_json::from_value(r.dietary_restrictions)?,
            thresholds: r.thresholds,
            updated_at: r.updated_at,
        })
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesUpdate {
    pub goal: Option<Goal>,
    pub tone: Option<Tone>,
    pub report_time: Option<String>,
    pub focus: Option<Vec<FocusArea>>,
    pub dietary_restrictions: Option<Vec<String>>,
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.goal.is_none()
            && self.tone.is_none()
            && self.report_time.is_none()
            && self.focus.is_none()
            && self.dietary_restrictions.is_none()
    }

    pub fn apply_to(&self, prefs: &mut Preferences) {
        if let Some(goal) = self.goal {
            prefs.goal = goal;
        }
        if let Some(tone) = self.tone {
            prefs.tone = tone;
        }
        if let Some(t) = &self.report_time {
            prefs.report_time = t.clone();
        }
        if let Some(focus) = &self.focus {
            prefs.focus = focus.clone();
        }
        if let Some(d) = &self.dietary_restrictions {
            prefs.dietary_restrictions = d.clone();
        }
    }
}
