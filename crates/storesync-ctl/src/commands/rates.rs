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

//! Implementation of the `rates` command.

use anyhow::{Context, Result};
use storesync::{RateAccounting, DAL};

/// Print incoming/processed throughput for the trailing window.
pub async fn run(dal: &DAL, window: &str) -> Result<()> {
    let duration = super::parse_duration(window)
        .with_context(|| format!("Invalid window: '{}'", window))?;
    let std_window = duration
        .to_std()
        .context("Window must be a positive duration")?;

    let snapshot = RateAccounting::new(dal.clone())
        .snapshot_now(std_window)
        .await
        .context("Failed to read rates")?;

    println!("Throughput over the last {}", window);
    println!("incoming   {}", snapshot.incoming);
    println!("processed  {}", snapshot.processed);
    Ok(())
}
