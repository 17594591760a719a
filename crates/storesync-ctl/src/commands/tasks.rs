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

//! Implementation of the `retry` and `mark-success` operator actions.

use anyhow::{anyhow, Context, Result};
use storesync::{TaskFilter, TaskOrder, TaskStatus, DAL};

const BATCH: i64 = 500;

/// Reset failed tasks back to pending.
pub async fn retry(dal: &DAL, ids: Vec<i64>, all_failed: bool) -> Result<()> {
    let reset = if all_failed {
        let mut total = 0;
        loop {
            let batch = dal
                .tasks()
                .find_by(
                    TaskFilter {
                        status: Some(TaskStatus::Failed),
                        ..Default::default()
                    },
                    TaskOrder::IdAsc,
                    BATCH,
                    0,
                )
                .await
                .context("Failed to list failed tasks")?;
            if batch.is_empty() {
                break;
            }
            let ids: Vec<i64> = batch.iter().map(|t| t.id).collect();
            let reset = dal
                .tasks()
                .reset_for_retry(ids)
                .await
                .context("Failed to reset tasks")?;
            tracing::info!(reset, "Reset a batch of failed tasks");
            total += reset;
            if reset == 0 {
                break;
            }
        }
        total
    } else {
        if ids.is_empty() {
            return Err(anyhow!("Provide task ids or --all-failed"));
        }
        dal.tasks()
            .reset_for_retry(ids)
            .await
            .context("Failed to reset tasks")?
    };

    println!("Reset {} task(s) to pending", reset);
    Ok(())
}

/// Force failed tasks to success without re-executing.
pub async fn mark_success(dal: &DAL, ids: Vec<i64>) -> Result<()> {
    let marked = dal
        .tasks()
        .force_success(ids)
        .await
        .context("Failed to mark tasks")?;

    println!("Marked {} task(s) as success", marked);
    Ok(())
}
