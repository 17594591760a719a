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

//! Implementation of the `purge` command.

use anyhow::{Context, Result};
use storesync::{QueuePurger, DAL};

/// Apply the retention policy to both stores.
pub async fn run(dal: &DAL) -> Result<()> {
    let report = QueuePurger::new(dal.clone())
        .purge_all()
        .await
        .context("Purge failed")?;

    println!(
        "Removed {} task(s) and {} webhook log(s)",
        report.tasks_removed, report.webhook_logs_removed
    );
    Ok(())
}
