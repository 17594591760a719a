/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Retention / Purge Policy
//!
//! Periodic compaction bounding the size of both queue tables while
//! preserving recent and in-flight history. Two tiers, run in order:
//!
//! 1. Delete purge-eligible records older than 30 days.
//! 2. If the table still holds more than 1,000 records: delete eligible
//!    records older than 7 days, and keep at most the 1,000 most recently
//!    created eligible records regardless of age.
//!
//! For tasks, only rows that completed successfully are eligible:
//! `processing` work is in flight and `failed` work stays visible to
//! operators until retried or overridden. Every webhook log row is eligible.

use crate::dal::DAL;
use crate::error::StorageError;

/// The 30-day / 1,000-row / 7-day compaction rule.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Tier 1: eligible records older than this are always removed.
    pub max_age_days: i64,
    /// Row-count threshold that arms tier 2, and the number of newest
    /// eligible records tier 2 keeps.
    pub cap: i64,
    /// Tier 2: age limit applied once the table is over the cap.
    pub capped_max_age_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            cap: 1_000,
            capped_max_age_days: 7,
        }
    }
}

/// Rows removed from each store by one purge pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PurgeReport {
    pub tasks_removed: usize,
    pub webhook_logs_removed: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.tasks_removed + self.webhook_logs_removed
    }
}

/// Applies the retention policy to the task and webhook-log stores.
#[derive(Clone)]
pub struct QueuePurger {
    dal: DAL,
    policy: RetentionPolicy,
}

impl QueuePurger {
    /// Creates a purger with the default 30d/1000/7d policy.
    pub fn new(dal: DAL) -> Self {
        Self::with_policy(dal, RetentionPolicy::default())
    }

    /// Creates a purger with an explicit policy.
    pub fn with_policy(dal: DAL, policy: RetentionPolicy) -> Self {
        Self { dal, policy }
    }

    /// Compacts both stores. Returns rows removed per store.
    pub async fn purge_all(&self) -> Result<PurgeReport, StorageError> {
        let report = PurgeReport {
            tasks_removed: self.purge_tasks().await?,
            webhook_logs_removed: self.purge_webhook_logs().await?,
        };
        tracing::info!(
            tasks_removed = report.tasks_removed,
            webhook_logs_removed = report.webhook_logs_removed,
            "Purge pass finished"
        );
        Ok(report)
    }

    /// Compacts the task store. Returns rows removed.
    pub async fn purge_tasks(&self) -> Result<usize, StorageError> {
        let tasks = self.dal.tasks();
        let now = crate::dal::now();

        let mut removed = tasks
            .delete_purgeable_older_than(now - chrono::Duration::days(self.policy.max_age_days))
            .await?;

        if tasks.count_all().await? > self.policy.cap {
            // The keep-the-newest cutoff is derived before the age delete so
            // removing a stale row cannot backfill the cap with an older one.
            let id_cutoff = tasks.nth_newest_purgeable_id(self.policy.cap).await?;
            removed += tasks
                .delete_purgeable_older_than(
                    now - chrono::Duration::days(self.policy.capped_max_age_days),
                )
                .await?;
            if let Some(id_cutoff) = id_cutoff {
                removed += tasks.delete_purgeable_below(id_cutoff).await?;
            }
        }

        tracing::debug!(removed, "Task store purged");
        Ok(removed)
    }

    /// Compacts the webhook log store. Returns rows removed.
    pub async fn purge_webhook_logs(&self) -> Result<usize, StorageError> {
        let logs = self.dal.webhook_logs();
        let now = crate::dal::now();

        let mut removed = logs
            .delete_older_than(now - chrono::Duration::days(self.policy.max_age_days))
            .await?;

        if logs.count_all().await? > self.policy.cap {
            let id_cutoff = logs.nth_newest_id(self.policy.cap).await?;
            removed += logs
                .delete_older_than(now - chrono::Duration::days(self.policy.capped_max_age_days))
                .await?;
            if let Some(id_cutoff) = id_cutoff {
                removed += logs.delete_below(id_cutoff).await?;
            }
        }

        tracing::debug!(removed, "Webhook log store purged");
        Ok(removed)
    }
}
