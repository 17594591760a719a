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

//! Task Scheduler
//!
//! The producer API used by webhook handlers and sync commands. Owns the
//! deduplication-by-name rule: for a given name at most one pending (`new`)
//! task exists at a time, so a burst of webhook events for the same remote
//! entity merges into a single queued unit of work instead of appending
//! duplicates. Tasks already in a terminal state never block a fresh one.

use serde_json::Value;

use crate::dal::DAL;
use crate::error::QueueError;
use crate::models::task::{NewTask, Task, TaskMeta};

/// Operation suffixes recognized when deriving a task's coarse group from
/// its fine-grained type.
const OPERATION_SUFFIXES: [&str; 6] = [
    "import",
    "export",
    "delete",
    "update",
    "sync",
    "recalculate",
];

/// Derives the dedup name for a `(type, storekeeper_id)` pair.
///
/// Tasks with no single remote subject (`storekeeper_id == 0`) key on the
/// bare type.
pub fn task_name_for(task_type: &str, storekeeper_id: i64) -> String {
    if storekeeper_id == 0 {
        task_type.to_string()
    } else {
        format!("{}::{}", task_type, storekeeper_id)
    }
}

/// Derives the coarse group from a fine-grained type by stripping a known
/// operation suffix: `"product-import"` -> `"product"`,
/// `"coupon-code-import"` -> `"coupon-code"`. Unrecognized shapes fall back
/// to the full type.
pub fn type_group_for(task_type: &str) -> String {
    if let Some((prefix, suffix)) = task_type.rsplit_once('-') {
        if !prefix.is_empty() && OPERATION_SUFFIXES.contains(&suffix) {
            return prefix.to_string();
        }
    }
    task_type.to_string()
}

/// Builds a display title from the type and remote subject id.
pub fn title_for(task_type: &str, storekeeper_id: i64) -> String {
    let mut title = task_type.replace('-', " ");
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    if storekeeper_id != 0 {
        title.push_str(&format!(" (#{})", storekeeper_id));
    }
    title
}

/// The producer-facing scheduling surface.
#[derive(Clone)]
pub struct TaskScheduler {
    dal: DAL,
}

impl TaskScheduler {
    /// Creates a scheduler over an explicit store handle.
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Enqueues work for a remote entity, merging into an existing pending
    /// task with the same derived name when one exists.
    ///
    /// `force_processing` is a drainer hint (e.g. bypass a preview run); it
    /// travels in the meta envelope and does not change the state machine.
    pub async fn schedule_task(
        &self,
        task_type: &str,
        storekeeper_id: i64,
        payload: Value,
        force_processing: bool,
    ) -> Result<Task, QueueError> {
        let name = task_name_for(task_type, storekeeper_id);
        self.schedule_named(task_type, &name, storekeeper_id, payload, force_processing)
            .await
    }

    /// Enqueues work under a caller-chosen dedup name.
    ///
    /// Used when a single operation is better modeled by an explicit key,
    /// for instance a parent-product recalculation that should only ever
    /// have one pending instance per parent regardless of the triggering
    /// type.
    pub async fn reschedule_task(
        &self,
        task_type: &str,
        name: &str,
        payload: Value,
    ) -> Result<Task, QueueError> {
        self.schedule_named(task_type, name, 0, payload, false)
            .await
    }

    async fn schedule_named(
        &self,
        task_type: &str,
        name: &str,
        storekeeper_id: i64,
        payload: Value,
        force_processing: bool,
    ) -> Result<Task, QueueError> {
        let tasks = self.dal.tasks();
        let existing = tasks.find_pending_by_name(name).await?;

        let new_task = NewTask {
            name: name.to_string(),
            title: title_for(task_type, storekeeper_id),
            task_type: task_type.to_string(),
            type_group: type_group_for(task_type),
            storekeeper_id,
            meta: TaskMeta::new(payload).with_force(force_processing),
        };

        let merged = existing.is_some();
        let task = tasks.upsert(new_task, existing.as_ref()).await?;

        if merged {
            tracing::debug!(task_id = task.id, name = %task.name, "Merged into pending task");
        } else {
            tracing::info!(task_id = task.id, name = %task.name, task_type, "Task scheduled");
        }
        Ok(task)
    }
}
