use std::sync::Arc;

use time::{Date, OffsetDateTime};
use tracing::{info, instrument};

use crate::messages::send_and_log;
use crate::messaging::{MessagingProvider, SendResult};
use crate::store::Store;
use crate::summary::{format_summary_text, SummaryComposer};
use crate::users::{Preferences, User};

/// Log `type` for scheduled reports; doubles as the "already sent" marker.
pub const DAILY_SUMMARY_KIND: &str = "daily_summary";

pub struct ReportService {
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessagingProvider>,
    composer: SummaryComposer,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn MessagingProvider>,
        composer: SummaryComposer,
    ) -> Self {
        Self {
            store,
            messenger,
            composer,
        }
    }

    /// Composes and sends the report for `date`, logging it as `daily_summary`.
    #[instrument(skip_all, fields(user_id = %user.id, %date))]
    pub async fn send_daily_report(
        &self,
        user: &User,
        prefs: &Preferences,
        date: Date,
        at: OffsetDateTime,
    ) -> anyhow::Result<SendResult> {
        let summary = self.composer.compose(user.id, date).await?;
        let text = format_summary_text(&summary, prefs.tone);
        let result = send_and_log(
            self.store.as_ref(),
            self.messenger.as_ref(),
            Some(user.id),
            &user.phone,
            &text,
            DAILY_SUMMARY_KIND,
            at,
        )
        .await?;
        info!(meals = summary.meals_count, delivered = result.success, "daily report sent");
        Ok(result)
    }
}
