use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::QuotaConfig;
use crate::db::{PromptRecord, PromptStore};
use crate::error::DatabaseError;
use crate::{with_timeout, Result};

/// Per-user, per-UTC-day cap on chat completions.
pub struct UsageGate {
    prompts: Arc<dyn PromptStore>,
    daily_limit: u64,
    fail_open: bool,
    store_timeout: Duration,
}

impl UsageGate {
    pub fn new(prompts: Arc<dyn PromptStore>, quota: &QuotaConfig, store_timeout: Duration) -> Self {
        Self {
            prompts,
            daily_limit: quota.daily_limit,
            fail_open: quota.fail_open,
            store_timeout,
        }
    }

    pub async fn count_today(&self, email: &str) -> Result<u64> {
        self.count_on(email, Utc::now().date_naive()).await
    }

    /// With `fail_open`, a failed count reads as zero so the request proceeds.
    pub async fn count_on(&self, email: &str, date: NaiveDate) -> Result<u64> {
        let counted = with_timeout(
            self.store_timeout,
            self.prompts.count_by_email_and_date(email, date),
            DatabaseError::Timeout,
        )
        .await;

        match counted {
            Ok(count) => Ok(count),
            Err(e) if self.fail_open => {
                warn!("Usage count for {} failed, admitting request: {}", email, e);
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn allows(&self, used_today: u64) -> bool {
        used_today < self.daily_limit
    }

    pub async fn allow(&self, email: &str) -> Result<bool> {
        Ok(self.allows(self.count_today(email).await?))
    }

    /// Requests left after `queries` have been served today.
    pub fn balance(&self, queries: u64) -> u64 {
        self.daily_limit.saturating_sub(queries)
    }

    pub async fn record(&self, record: &PromptRecord) -> Result<()> {
        with_timeout(self.store_timeout, self.prompts.put(record), DatabaseError::Timeout).await?;
        Ok(())
    }
}
