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

//! Implementation of the `status` command.

use anyhow::{Context, Result};
use storesync::{TaskFilter, TaskOrder, TaskStatus, DAL};

/// Print queue depth per status plus the most recent failures.
pub async fn run(dal: &DAL, failures: i64) -> Result<()> {
    println!("Queue status");
    println!("------------");
    for status in [
        TaskStatus::New,
        TaskStatus::Processing,
        TaskStatus::Success,
        TaskStatus::Failed,
    ] {
        let count = dal
            .tasks()
            .count(TaskFilter {
                status: Some(status),
                ..Default::default()
            })
            .await
            .context("Failed to count tasks")?;
        println!("{:<12} {}", status.as_str(), count);
    }

    let webhook_count = dal
        .webhook_logs()
        .count(Default::default())
        .await
        .context("Failed to count webhook logs")?;
    println!("{:<12} {}", "webhook logs", webhook_count);

    if failures > 0 {
        let failed = dal
            .tasks()
            .find_by(
                TaskFilter {
                    status: Some(TaskStatus::Failed),
                    ..Default::default()
                },
                TaskOrder::UpdatedDesc,
                failures,
                0,
            )
            .await
            .context("Failed to list failed tasks")?;

        if !failed.is_empty() {
            println!();
            println!("Recent failures");
            println!("---------------");
            for task in failed {
                let (class, message, reference) = match task.meta() {
                    Ok(meta) => match meta.error {
                        Some(record) => (
                            record.class,
                            record.message,
                            record.reference.unwrap_or_default(),
                        ),
                        None => (String::new(), String::new(), String::new()),
                    },
                    Err(_) => ("<unreadable meta>".to_string(), String::new(), String::new()),
                };
                println!(
                    "#{:<6} {:<32} ran {:<2} {} {} {}",
                    task.id, task.name, task.times_ran, class, message, reference
                );
            }
        }
    }

    Ok(())
}
