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

//! Rate / Health Accounting
//!
//! Read-only throughput queries for dashboards and alerts: how many tasks
//! were created inside a trailing window (producer pressure) versus how many
//! reached a terminal state inside it (drain throughput). Plain SELECT
//! counts; nothing here locks or contends with the drainer.

use chrono::NaiveDateTime;
use std::time::Duration;

use crate::dal::DAL;
use crate::error::StorageError;

/// Incoming/processed counts for one trailing window.
#[derive(Debug, Clone, Copy)]
pub struct RateSnapshot {
    /// End of the window the counts refer to.
    pub reference: NaiveDateTime,
    /// Window length.
    pub window: Duration,
    /// Tasks created inside the window.
    pub incoming: i64,
    /// Tasks that reached a terminal state inside the window.
    pub processed: i64,
}

/// Read-only queue throughput queries.
#[derive(Clone)]
pub struct RateAccounting {
    dal: DAL,
}

impl RateAccounting {
    /// Creates the accounting view over an explicit store handle.
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Tasks created in the trailing `window` ending at `reference`.
    pub async fn incoming(
        &self,
        reference: NaiveDateTime,
        window: Duration,
    ) -> Result<i64, StorageError> {
        let from = window_start(reference, window);
        self.dal.tasks().count_created_between(from, reference).await
    }

    /// Tasks that transitioned into a terminal state in the trailing
    /// `window` ending at `reference`.
    pub async fn processed(
        &self,
        reference: NaiveDateTime,
        window: Duration,
    ) -> Result<i64, StorageError> {
        let from = window_start(reference, window);
        self.dal
            .tasks()
            .count_finished_between(from, reference)
            .await
    }

    /// Both rates for the same window.
    pub async fn snapshot(
        &self,
        reference: NaiveDateTime,
        window: Duration,
    ) -> Result<RateSnapshot, StorageError> {
        Ok(RateSnapshot {
            reference,
            window,
            incoming: self.incoming(reference, window).await?,
            processed: self.processed(reference, window).await?,
        })
    }

    /// Both rates for the trailing window ending now.
    pub async fn snapshot_now(&self, window: Duration) -> Result<RateSnapshot, StorageError> {
        self.snapshot(crate::dal::now(), window).await
    }
}

fn window_start(reference: NaiveDateTime, window: Duration) -> NaiveDateTime {
    reference - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(1))
}
