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

//! Error types for the queue engine.
//!
//! The taxonomy separates record-shape problems (`ValidationError`) from
//! backing-store problems (`StorageError`) from work-execution problems
//! (`ExecutorError`). Executor failures are values, not panics: the drainer
//! maps an `Err` deterministically into the structured error record stored on
//! the failed task.

use thiserror::Error;

/// A task or webhook record fails required-field invariants before a write.
///
/// Always surfaced to the caller synchronously; never silently dropped.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },

    #[error("required field `{field}` must not be blank")]
    BlankField { field: &'static str },

    #[error("invalid task status `{status}`")]
    InvalidStatus { status: String },

    #[error("invalid meta data: {0}")]
    InvalidMetaData(#[from] serde_json::Error),

    #[error("unsupported meta data version {version} (this build reads up to {supported})")]
    UnsupportedMetaVersion { version: u32, supported: u32 },
}

/// The backing store rejected a read or write.
///
/// `NoRowsAffected` covers the "zero rows affected" case on an expected
/// update: the row no longer exists, usually because it lost a race with the
/// purge policy. Callers treat that as a benign race (logged, not retried).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("update of {entity} {id} affected no rows")]
    NoRowsAffected { entity: &'static str, id: i64 },
}

/// Umbrella error for store writes that can fail either validation or storage.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A failure reported by a registered task executor.
///
/// Executors return this instead of panicking; the fields map one-to-one onto
/// the error record persisted on the failed task. `reference` is an optional
/// correlation id an operator can use to cross-reference external logs or
/// support tickets.
#[derive(Error, Debug, Clone)]
#[error("{class}: {message}")]
pub struct ExecutorError {
    /// Short classifier, e.g. `"BackofficeUnreachable"`.
    pub class: String,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Optional multi-line diagnostic trace.
    pub trace: Option<String>,
    /// Optional correlation id.
    pub reference: Option<String>,
}

impl ExecutorError {
    /// Creates a new executor error with a class and message.
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            trace: None,
            reference: None,
        }
    }

    /// Attaches a diagnostic trace.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Attaches a correlation reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A failure fatal to an entire drain run.
///
/// Per-task failures never surface here; only the store itself becoming
/// unreachable aborts a run, leaving all touched tasks in their last-known
/// good state for the next scheduled drain to resume.
#[derive(Error, Debug)]
pub enum DrainError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
