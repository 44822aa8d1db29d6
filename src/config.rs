use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub vision_model: String,
    pub transcribe_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_from: String,
    pub api_base: String,
    pub validate_signature: bool,
    pub webhook_public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub transcribe_timeout_secs: u64,
    pub audio_min_bytes: usize,
    pub audio_max_bytes: usize,
    pub language_check: bool,
}

impl MediaConfig {
    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcribe_timeout_secs)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            transcribe_timeout_secs: 30,
            audio_min_bytes: 1024,
            audio_max_bytes: 25 * 1024 * 1024,
            language_check: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Which meal tagging strategy this deployment writes and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealTagging {
    Keywords,
    Llm,
}

impl std::str::FromStr for MealTagging {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keywords" | "keyword" => Ok(Self::Keywords),
            "llm" => Ok(Self::Llm),
            other => anyhow::bail!("unknown MEAL_TAGGING value {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub openai: OpenAiConfig,
    pub twilio: TwilioConfig,
    pub media: MediaConfig,
    pub storage: Option<StorageConfig>,
    pub meal_tagging: MealTagging,
    pub utc_offset: UtcOffset,
    pub reports_enabled: bool,
    pub admin_token: Option<String>,
    pub default_language: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let openai = OpenAiConfig {
            api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is required")?,
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            vision_model: env_or("OPENAI_VISION_MODEL", "gpt-4o-mini"),
            transcribe_model: env_or("OPENAI_TRANSCRIBE_MODEL", "whisper-1"),
            timeout_secs: env_parse("LLM_TIMEOUT_SECS", 30)?,
        };

        let twilio = TwilioConfig {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID is required")?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN is required")?,
            whatsapp_from: std::env::var("TWILIO_WHATSAPP_FROM")
                .context("TWILIO_WHATSAPP_FROM is required")?,
            api_base: env_or("TWILIO_API_BASE", "https://api.twilio.com"),
            validate_signature: env_parse("TWILIO_VALIDATE_SIGNATURE", false)?,
            webhook_public_url: std::env::var("WEBHOOK_PUBLIC_URL").ok(),
        };
        if twilio.validate_signature && twilio.webhook_public_url.is_none() {
            anyhow::bail!("WEBHOOK_PUBLIC_URL is required when TWILIO_VALIDATE_SIGNATURE is on");
        }

        let defaults = MediaConfig::default();
        let media = MediaConfig {
            transcribe_timeout_secs: env_parse(
                "TRANSCRIBE_TIMEOUT_SECS",
                defaults.transcribe_timeout_secs,
            )?,
            audio_min_bytes: env_parse("AUDIO_MIN_BYTES", defaults.audio_min_bytes)?,
            audio_max_bytes: env_parse("AUDIO_MAX_BYTES", defaults.audio_max_bytes)?,
            language_check: env_parse("TRANSCRIBE_LANGUAGE_CHECK", defaults.language_check)?,
        };

        let storage = match (
            std::env::var("MINIO_ENDPOINT"),
            std::env::var("MINIO_BUCKET"),
            std::env::var("MINIO_ACCESS_KEY"),
            std::env::var("MINIO_SECRET_KEY"),
        ) {
            (Ok(endpoint), Ok(bucket), Ok(access_key), Ok(secret_key)) => Some(StorageConfig {
                endpoint,
                bucket,
                access_key,
                secret_key,
                region: env_or("MINIO_REGION", "us-east-1"),
            }),
            _ => None,
        };

        let meal_tagging = env_or("MEAL_TAGGING", "keywords").parse()?;
        let utc_offset = parse_utc_offset(&env_or("APP_UTC_OFFSET", "+00:00"))?;

        Ok(Self {
            database_url,
            openai,
            twilio,
            media,
            storage,
            meal_tagging,
            utc_offset,
            reports_enabled: env_parse("REPORTS_ENABLED", true)?,
            admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            default_language: env_or("DEFAULT_LANGUAGE", "en"),
        })
    }
}

/// Parses `+HH:MM` / `-HH:MM`; a bare `Z` or `UTC` means zero offset.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid APP_UTC_OFFSET {raw:?}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {v:?}: {e}")),
        Err(_) => Ok(default),
    }
}
