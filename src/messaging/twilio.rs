use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use ring::hmac;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{error, warn};

use super::{IncomingMessage, MessageKind, MessagingProvider, SendResult, WebhookError};
use crate::config::TwilioConfig;

lazy_static! {
    static ref E164_RE: Regex = Regex::new(r"^\+[1-9]\d{6,14}$").unwrap();
}

const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    message: Option<String>,
}

#[derive(Clone)]
pub struct TwilioWhatsApp {
    http: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioWhatsApp {
    pub fn new(config: TwilioConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

fn with_prefix(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

/// The URL followed by every parameter name and value, sorted by name.
fn signed_data(url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let mut data = url.to_string();
    for (k, v) in sorted {
        data.push_str(k);
        data.push_str(v);
    }
    data
}

fn signing_key(auth_token: &str) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, auth_token.as_bytes())
}

/// Base64 HMAC-SHA1 over [`signed_data`], as sent in `X-Twilio-Signature`.
#[cfg(test)]
fn signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let tag = hmac::sign(&signing_key(auth_token), signed_data(url, params).as_bytes());
    STANDARD.encode(tag.as_ref())
}

#[async_trait]
impl MessagingProvider for TwilioWhatsApp {
    fn parse_incoming(
        &self,
        params: &[(String, String)],
        received_at: OffsetDateTime,
    ) -> Result<IncomingMessage, WebhookError> {
        let from = param(params, "From").ok_or(WebhookError::MissingSender)?;
        let from = from.strip_prefix(WHATSAPP_PREFIX).unwrap_or(from).trim();
        if !E164_RE.is_match(from) {
            return Err(WebhookError::InvalidSender(from.to_string()));
        }

        let text = param(params, "Body").map(str::to_string);
        let num_media: u32 = param(params, "NumMedia").and_then(|n| n.parse().ok()).unwrap_or(0);
        let media_url = if num_media > 0 {
            param(params, "MediaUrl0").map(str::to_string)
        } else {
            None
        };
        let mime_type = media_url
            .as_ref()
            .and(param(params, "MediaContentType0"))
            .map(str::to_string);

        let kind = match (&media_url, &mime_type) {
            (Some(_), Some(mime)) if mime.to_ascii_lowercase().starts_with("audio/") => MessageKind::Voice,
            (Some(_), _) => MessageKind::Image,
            (None, _) if text.is_some() => MessageKind::Text,
            (None, _) => return Err(WebhookError::EmptyMessage),
        };

        Ok(IncomingMessage {
            from: from.to_string(),
            kind,
            text,
            media_url,
            mime_type,
            message_id: param(params, "MessageSid").map(str::to_string),
            timestamp: received_at,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> SendResult {
        let form = [
            ("From", with_prefix(&self.config.whatsapp_from)),
            ("To", with_prefix(to)),
            ("Body", text.to_string()),
        ];
        let response = match self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, %to, "twilio send failed");
                return SendResult::failed(e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResource>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(%status, %to, error = %message, "twilio rejected message");
            return SendResult::failed(message);
        }
        let sid = serde_json::from_str::<MessageResource>(&body).ok().and_then(|m| m.sid);
        SendResult::sent(sid)
    }

    fn validate_webhook(&self, signature_header: Option<&str>, params: &[(String, String)]) -> bool {
        if !self.config.validate_signature {
            return true;
        }
        let (Some(provided), Some(url)) = (signature_header, self.config.webhook_public_url.as_deref())
        else {
            return false;
        };
        let Ok(provided) = STANDARD.decode(provided.trim()) else {
            return false;
        };
        let data = signed_data(url, params);
        hmac::verify(&signing_key(&self.config.auth_token), data.as_bytes(), &provided).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(validate: bool) -> TwilioWhatsApp {
        TwilioWhatsApp::new(
            TwilioConfig {
                account_sid: "AC123".into(),
                auth_token: "12345".into(),
                whatsapp_from: "+14155238886".into(),
                api_base: "https://api.twilio.com".into(),
                validate_signature: validate,
                webhook_public_url: Some("https://mycompany.com/myapp.php?foo=1&bar=2".into()),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_text_message() {
        let msg = provider(false)
            .parse_incoming(
                &params(&[("From", "whatsapp:+447700900123"), ("Body", "two eggs"), ("MessageSid", "SM1")]),
                OffsetDateTime::UNIX_EPOCH,
            )
            .unwrap();
        assert_eq!(msg.from, "+447700900123");
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text.as_deref(), Some("two eggs"));
        assert_eq!(msg.message_id.as_deref(), Some("SM1"));
    }

    #[test]
    fn media_kind_follows_mime() {
        let p = provider(false);
        let voice = p
            .parse_incoming(
                &params(&[
                    ("From", "whatsapp:+447700900123"),
                    ("NumMedia", "1"),
                    ("MediaUrl0", "https://api.twilio.com/media/1"),
                    ("MediaContentType0", "audio/ogg"),
                ]),
                OffsetDateTime::UNIX_EPOCH,
            )
            .unwrap();
        assert_eq!(voice.kind, MessageKind::Voice);

        let image = p
            .parse_incoming(
                &params(&[
                    ("From", "whatsapp:+447700900123"),
                    ("NumMedia", "1"),
                    ("MediaUrl0", "https://api.twilio.com/media/2"),
                    ("MediaContentType0", "image/jpeg"),
                    ("Body", "dinner"),
                ]),
                OffsetDateTime::UNIX_EPOCH,
            )
            .unwrap();
        assert_eq!(image.kind, MessageKind::Image);
        assert_eq!(image.text.as_deref(), Some("dinner"));
    }

    #[test]
    fn rejects_bad_payloads() {
        let p = provider(false);
        let at = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(
            p.parse_incoming(&params(&[("Body", "hi")]), at),
            Err(WebhookError::MissingSender)
        );
        assert!(matches!(
            p.parse_incoming(&params(&[("From", "whatsapp:12345"), ("Body", "hi")]), at),
            Err(WebhookError::InvalidSender(_))
        ));
        assert_eq!(
            p.parse_incoming(&params(&[("From", "whatsapp:+447700900123"), ("Body", "  ")]), at),
            Err(WebhookError::EmptyMessage)
        );
    }

    #[test]
    fn signature_matches_published_example() {
        let p = params(&[
            ("CallSid", "CA1234567890ABCDE"),
            ("Caller", "+12349013030"),
            ("Digits", "1234"),
            ("From", "+12349013030"),
            ("To", "+18005551212"),
        ]);
        let url = "https://mycompany.com/myapp.php?foo=1&bar=2";
        assert_eq!(signature("12345", url, &p), "0/KCTR6DLpKmkAf8muzZqo1nDgQ=");

        let provider = provider(true);
        assert!(provider.validate_webhook(Some("0/KCTR6DLpKmkAf8muzZqo1nDgQ="), &p));
        assert!(!provider.validate_webhook(Some("AAAA"), &p));
        assert!(!provider.validate_webhook(None, &p));
    }

    #[test]
    fn tampered_params_fail_validation() {
        let mut p = params(&[("From", "whatsapp:+447700900123"), ("Body", "hi")]);
        let url = "https://mycompany.com/myapp.php?foo=1&bar=2";
        let sig = signature("12345", url, &p);
        let provider = provider(true);
        assert!(provider.validate_webhook(Some(&sig), &p));

        p[1].1 = "hi there".into();
        assert!(!provider.validate_webhook(Some(&sig), &p));
    }

    #[test]
    fn validation_disabled_accepts_anything() {
        assert!(provider(false).validate_webhook(None, &[]));
    }
}
