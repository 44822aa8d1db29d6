use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::services::{ReportService, DAILY_SUMMARY_KIND};
use crate::clock::{day_bounds, Clock};
use crate::messaging::SendResult;
use crate::store::Store;
use crate::users::{Preferences, User};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub already_sent: usize,
    pub failed: usize,
}

/// Sends each user's daily report at their `reportTime`, matched to the minute
/// in local time. A minute with no tick is not caught up.
pub struct ReportScheduler {
    store: Arc<dyn Store>,
    reports: Arc<ReportService>,
    clock: Arc<dyn Clock>,
    offset: UtcOffset,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReportScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        reports: Arc<ReportService>,
        clock: Arc<dyn Clock>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            store,
            reports,
            clock,
            offset,
            handle: Mutex::new(None),
        }
    }

    /// Idle -> Running. A second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let this = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = this.clock.now();
                match this.tick(now).await {
                    Ok(r) if r.sent + r.failed > 0 => info!(?r, "report tick"),
                    Ok(_) => debug!("report tick, nothing due"),
                    Err(e) => error!(error = ?e, "report tick failed"),
                }
            }
        }));
        info!("report scheduler started");
    }

    /// Running -> Idle.
    pub fn stop(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(h) = handle.take() {
            h.abort();
            info!("report scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// One pass over all users. Fails only when the user list cannot be loaded.
    pub async fn tick(&self, now: OffsetDateTime) -> anyhow::Result<TickReport> {
        let local = now.to_offset(self.offset);
        let current = (local.hour(), local.minute());
        let mut report = TickReport::default();

        for (user, prefs) in self.store.users_with_preferences().await? {
            if prefs.report_hour_minute() != Some(current) {
                continue;
            }
            match self.send_if_due(&user, &prefs, now).await {
                Ok(Some(result)) if result.success => report.sent += 1,
                Ok(Some(_)) => report.failed += 1,
                Ok(None) => report.already_sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(user_id = %user.id, error = ?e, "daily report failed");
                }
            }
        }
        Ok(report)
    }

    /// `None` when today's report was already delivered. An undelivered report
    /// does not count, so a later matching tick the same day tries again.
    async fn send_if_due(
        &self,
        user: &User,
        prefs: &Preferences,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SendResult>> {
        let date = now.to_offset(self.offset).date();
        let (start, end) = day_bounds(date, self.offset);
        if self
            .store
            .has_delivered_outbound_between(user.id, DAILY_SUMMARY_KIND, start, end)
            .await?
        {
            return Ok(None);
        }
        let result = self.reports.send_daily_report(user, prefs, date, now).await?;
        Ok(Some(result))
    }

    /// Operator resend: ignores the time match and the sent-today marker.
    /// `None` when the user does not exist.
    pub async fn send_now(&self, user_id: Uuid) -> anyhow::Result<Option<SendResult>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        let now = self.clock.now();
        let prefs = match self.store.get_preferences(user_id).await? {
            Some(p) => p,
            None => Preferences::defaults(user_id, now),
        };
        let date = now.to_offset(self.offset).date();
        let result = self.reports.send_daily_report(&user, &prefs, date, now).await?;
        Ok(Some(result))
    }
}
