//! Typed tool arguments, validated against the four fixed tool contracts.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::users::{FocusArea, Goal, PreferencesUpdate, Tone};

lazy_static! {
    static ref REPORT_TIME_RE: Regex = Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").unwrap();
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("arguments do not match schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Field { field: &'static str, reason: String },
}

fn field(field: &'static str, reason: impl Into<String>) -> ArgsError {
    ArgsError::Field {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SetPreferences,
    LogMeal,
    RequestSummary,
    AskCoach,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::SetPreferences,
        ToolName::LogMeal,
        ToolName::RequestSummary,
        ToolName::AskCoach,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SetPreferences => "set_preferences",
            ToolName::LogMeal => "log_meal",
            ToolName::RequestSummary => "request_summary",
            ToolName::AskCoach => "ask_coach",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawSetPreferences {
    goal: Option<Goal>,
    tone: Option<Tone>,
    report_time: Option<String>,
    focus: Option<Vec<FocusArea>>,
    dietary_restrictions: Option<Vec<String>>,
    store_media: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLogMeal {
    text: String,
    when: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequestSummary {
    period: Period,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAskCoach {
    question: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPreferences {
    pub update: PreferencesUpdate,
    pub store_media: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogMeal {
    pub text: String,
    pub when: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub period: Period,
    pub date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskCoach {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    SetPreferences(SetPreferences),
    LogMeal(LogMeal),
    RequestSummary(RequestSummary),
    AskCoach(AskCoach),
}

fn decode<T: DeserializeOwned>(args: &Value) -> Result<T, ArgsError> {
    // A model that sends no arguments at all means "{}".
    let args = if args.is_null() { Value::Object(Default::default()) } else { args.clone() };
    Ok(serde_json::from_value(args)?)
}

impl ToolArgs {
    /// Validates `args` for `tool`. Naive datetimes are read in `offset`.
    pub fn parse(tool: ToolName, args: &Value, offset: UtcOffset) -> Result<Self, ArgsError> {
        match tool {
            ToolName::SetPreferences => {
                let raw: RawSetPreferences = decode(args)?;
                let report_time = raw.report_time.map(normalize_report_time).transpose()?;
                let dietary_restrictions = raw.dietary_restrictions.map(|items| {
                    items
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                });
                let focus = raw.focus.map(|mut f| {
                    let mut seen = Vec::with_capacity(f.len());
                    f.retain(|a| {
                        let fresh = !seen.contains(a);
                        seen.push(*a);
                        fresh
                    });
                    f
                });
                Ok(ToolArgs::SetPreferences(SetPreferences {
                    update: PreferencesUpdate {
                        goal: raw.goal,
                        tone: raw.tone,
                        report_time,
                        focus,
                        dietary_restrictions,
                    },
                    store_media: raw.store_media,
                }))
            }
            ToolName::LogMeal => {
                let raw: RawLogMeal = decode(args)?;
                if raw.text.is_empty() {
                    return Err(field("text", "must not be empty"));
                }
                // whitespace-only text is still a description; keep it as sent
                let text = if raw.text.trim().is_empty() {
                    raw.text
                } else {
                    raw.text.trim().to_string()
                };
                let when = raw.when.as_deref().map(|w| parse_when(w, offset)).transpose()?;
                Ok(ToolArgs::LogMeal(LogMeal { text, when }))
            }
            ToolName::RequestSummary => {
                let raw: RawRequestSummary = decode(args)?;
                let date = raw.date.as_deref().map(parse_date).transpose()?;
                Ok(ToolArgs::RequestSummary(RequestSummary {
                    period: raw.period,
                    date,
                }))
            }
            ToolName::AskCoach => {
                let raw: RawAskCoach = decode(args)?;
                let question = raw.question.trim().to_string();
                if question.is_empty() {
                    return Err(field("question", "must not be empty"));
                }
                Ok(ToolArgs::AskCoach(AskCoach { question }))
            }
        }
    }
}

/// Validates `H:MM`/`HH:MM` and zero-pads the hour.
fn normalize_report_time(raw: String) -> Result<String, ArgsError> {
    let raw = raw.trim();
    if !REPORT_TIME_RE.is_match(raw) {
        return Err(field("reportTime", format!("{raw:?} is not HH:MM")));
    }
    let (h, m) = raw.split_once(':').ok_or_else(|| field("reportTime", "missing ':'"))?;
    Ok(format!("{:0>2}:{m}", h))
}

fn parse_when(raw: &str, offset: UtcOffset) -> Result<OffsetDateTime, ArgsError> {
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(dt);
    }
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]"))
    })
    .map(|dt| dt.assume_offset(offset))
    .map_err(|_| field("when", format!("{raw:?} is not an ISO-8601 datetime")))
}

fn parse_date(raw: &str) -> Result<Date, ArgsError> {
    if !DATE_RE.is_match(raw) {
        return Err(field("date", format!("{raw:?} is not YYYY-MM-DD")));
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|e| field("date", e.to_string()))
}
