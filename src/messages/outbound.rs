use serde_json::json;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::Direction;
use crate::messaging::{MessagingProvider, SendResult};
use crate::store::Store;

/// Sends `text` and records the OUT log entry. Delivery failures are logged,
/// not returned; only the log write can fail.
pub async fn send_and_log(
    store: &dyn Store,
    messenger: &dyn MessagingProvider,
    user_id: Option<Uuid>,
    to: &str,
    text: &str,
    kind: &str,
    at: OffsetDateTime,
) -> anyhow::Result<SendResult> {
    let result = messenger.send_text(to, text).await;
    if !result.success {
        warn!(%to, kind, error = ?result.error, "reply not delivered");
    }

    let mut payload = json!({
        "to": to,
        "text": text,
        "type": kind,
        "delivered": result.success,
    });
    if let Some(id) = &result.message_id {
        payload["message_id"] = json!(id);
    }
    store
        .append_message_log(user_id, Direction::Out, payload, at)
        .await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, RecordingMessenger};

    #[tokio::test]
    async fn undelivered_reply_is_still_logged() {
        let store = MemoryStore::default();
        let user = store.find_or_create_user("+15550700000", "en").await.unwrap();
        let messenger = RecordingMessenger::failing();

        let result = send_and_log(
            &store,
            &messenger,
            Some(user.id),
            &user.phone,
            "hi",
            "reply",
            OffsetDateTime::UNIX_EPOCH,
        )
        .await
        .unwrap();

        assert!(!result.success);
        let logs = store.logs_for(user.id);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].direction, "OUT");
        assert_eq!(logs[0].payload["delivered"], false);
        assert_eq!(logs[0].payload["type"], "reply");
        assert!(logs[0].payload.get("message_id").is_none());
    }

    #[tokio::test]
    async fn delivered_reply_records_message_id() {
        let store = MemoryStore::default();
        let messenger = RecordingMessenger::default();

        send_and_log(&store, &messenger, None, "+15550700001", "too long", "error", OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        let logs = store.logs();
        assert_eq!(logs[0].user_id, None);
        assert_eq!(logs[0].payload["delivered"], true);
        assert!(logs[0].payload["message_id"].is_string());
    }
}
