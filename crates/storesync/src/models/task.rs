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

//! Task Model
//!
//! This module defines the data structures for queued synchronization work:
//! the persisted row, its status state machine, and the versioned meta-data
//! envelope carried by every task.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ValidationError;

/// Current version of the meta-data envelope written by this build.
///
/// Rows written by older builds (lower versions) remain readable; rows from a
/// newer build are rejected with `UnsupportedMetaVersion` instead of being
/// misinterpreted.
pub const META_VERSION: u32 = 1;

/// Status lifecycle of a task.
///
/// ```text
/// new --(picked up)--> processing --(executor ok)--> success
///                                  --(executor err)-> failed
/// failed --(operator retry)--> new
/// failed --(operator mark-success)--> success
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Enqueued, waiting for a drain run.
    New,
    /// Claimed by a drainer; execution in flight.
    Processing,
    /// Terminal: the executor returned normally, or an operator override.
    Success,
    /// Terminal until retried: the executor reported a failure.
    Failed,
}

impl TaskStatus {
    /// The canonical wire string stored in the `status` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parses a wire string back into a status.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "new" => Ok(TaskStatus::New),
            "processing" => Ok(TaskStatus::Processing),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ValidationError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }

    /// Whether this status is a terminal "done" state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// Wire strings of the two terminal states.
    pub const fn terminal_strs() -> [&'static str; 2] {
        ["success", "failed"]
    }

    /// Wire strings of the states eligible for retention purging.
    ///
    /// Only `success` is purge-eligible: failed work stays visible to
    /// operators indefinitely until retried or overridden.
    pub const fn purgeable_strs() -> [&'static str; 1] {
        ["success"]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure metadata stored inside a failed task's meta data.
///
/// Overwritten on every failed attempt, so only the latest failure is
/// retained. Field names are the wire contract read by the admin UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "exception-class")]
    pub class: String,
    #[serde(rename = "exception-message")]
    pub message: String,
    #[serde(rename = "exception-trace", default)]
    pub trace: String,
    #[serde(
        rename = "exception-reference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,
}

impl ErrorRecord {
    /// Maps an executor failure onto the persisted record.
    pub fn from_executor_error(err: &crate::error::ExecutorError) -> Self {
        Self {
            class: err.class.clone(),
            message: err.message.clone(),
            trace: err.trace.clone().unwrap_or_default(),
            reference: err.reference.clone(),
        }
    }
}

/// Versioned envelope serialized into the `meta_data` column.
///
/// The `payload` is opaque to the queue and interpreted only by the executor.
/// `force_processing` is a drainer hint set by the scheduler; it never
/// changes the state machine. On failure the `error` member is overwritten
/// with the latest error record while payload and hint survive, so an
/// operator retry re-runs the original work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub version: u32,
    #[serde(default)]
    pub force_processing: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl Default for TaskMeta {
    fn default() -> Self {
        Self {
            version: META_VERSION,
            force_processing: false,
            payload: Value::Null,
            error: None,
        }
    }
}

impl TaskMeta {
    /// Creates an envelope around an executor payload.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    /// Sets the drainer hint.
    pub fn with_force(mut self, force_processing: bool) -> Self {
        self.force_processing = force_processing;
        self
    }

    /// Records the latest failure, replacing any previous one.
    pub fn record_failure(&mut self, record: ErrorRecord) {
        self.error = Some(record);
    }

    /// Serializes the envelope for storage.
    pub fn encode(&self) -> Result<String, ValidationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes an envelope from storage.
    ///
    /// An empty column decodes to the default envelope; a version newer than
    /// this build understands is rejected rather than guessed at.
    pub fn decode(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let meta: TaskMeta = serde_json::from_str(raw)?;
        if meta.version > META_VERSION {
            return Err(ValidationError::UnsupportedMetaVersion {
                version: meta.version,
                supported: META_VERSION,
            });
        }
        Ok(meta)
    }
}

/// Represents a task record in the database.
///
/// This struct maps to the `tasks` table and contains all information about a
/// single unit of synchronization work, including its status, timing, and
/// executor payload.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Task {
    /// Store-assigned, monotonically increasing identifier
    pub id: i64,
    /// Deduplication key derived from `(task_type, storekeeper_id)`
    pub name: String,
    /// Human-readable label for display
    pub title: String,
    /// Fine-grained operation identifier resolving to an executor
    pub task_type: String,
    /// Coarse category used for filtering and grouping
    pub type_group: String,
    /// Remote-system identifier the task concerns (0 when none applies)
    pub storekeeper_id: i64,
    /// Current status wire string (see [`TaskStatus`])
    pub status: String,
    /// Count of execution attempts
    pub times_ran: i32,
    /// Serialized [`TaskMeta`] envelope
    pub meta_data: String,
    /// Wall-clock time of the last execution attempt, in milliseconds
    pub execution_duration_ms: Option<i64>,
    /// Timestamp when the record was created
    pub date_created: NaiveDateTime,
    /// Timestamp touched on every state transition
    pub date_updated: NaiveDateTime,
}

impl Task {
    /// Parses the stored status string.
    pub fn status(&self) -> Result<TaskStatus, ValidationError> {
        TaskStatus::parse(&self.status)
    }

    /// Decodes the stored meta-data envelope.
    pub fn meta(&self) -> Result<TaskMeta, ValidationError> {
        TaskMeta::decode(&self.meta_data)
    }

    /// Whether the row is in a terminal "done" state.
    pub fn is_terminal(&self) -> bool {
        TaskStatus::parse(&self.status)
            .map(|s| s.is_terminal())
            .unwrap_or(false)
    }
}

/// Fields supplied by a producer when enqueuing work.
///
/// Status, attempt count, and timestamps are owned by the store and stamped
/// at insert time.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub title: String,
    pub task_type: String,
    pub type_group: String,
    pub storekeeper_id: i64,
    pub meta: TaskMeta,
}

/// Insertable row built by the DAL from a [`NewTask`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::tasks)]
pub(crate) struct NewTaskRow {
    pub name: String,
    pub title: String,
    pub task_type: String,
    pub type_group: String,
    pub storekeeper_id: i64,
    pub status: String,
    pub times_ran: i32,
    pub meta_data: String,
    pub date_created: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}

/// Partial update applied through `TaskDAL::update`.
///
/// `None` fields are left untouched. `date_updated` is always stamped by the
/// DAL regardless of what the caller sets.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::database::schema::tasks)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub times_ran: Option<i32>,
    pub meta_data: Option<String>,
    pub execution_duration_ms: Option<i64>,
    pub date_updated: Option<NaiveDateTime>,
}
