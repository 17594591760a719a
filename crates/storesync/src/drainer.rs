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

//! Task Drainer
//!
//! The worker loop that executes the pending backlog. One `drain()` call is
//! one run: it reclaims stale in-flight rows, walks `new` tasks in creation
//! order, dispatches each to its registered executor, and writes back status
//! and failure metadata. Key behaviors:
//!
//! - A single task failure never aborts the drain of subsequent tasks
//! - A missing executor is a deployment problem, not a data problem: the
//!   task is skipped with a warning and stays `new`
//! - The per-run wall-clock budget stops intake between tasks; the in-flight
//!   task always finishes rather than being abandoned mid-write
//! - Concurrent drain runs racing on the same backlog are safe: claiming is
//!   a guarded compare-and-set, and a lost race is a silent skip
//!
//! Batch sync operations are expected to run for minutes up to tens of
//! hours; the budget is supplied by the caller, not intrinsic to the queue.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::{DrainError, ExecutorError, StorageError};
use crate::executor::{ExecutorRegistry, TaskExecutor};
use crate::models::task::{ErrorRecord, Task, TaskMeta};

/// Configuration for one drain run.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Wall-clock budget for the whole run. `None` runs until the backlog is
    /// empty.
    pub time_budget: Option<Duration>,
    /// How many pending rows to fetch per backlog read.
    pub batch_size: i64,
    /// Age after which a `processing` row is considered stranded by a
    /// crashed run and re-queued.
    pub stale_after: Duration,
    /// Preview mode: examine the backlog but only execute tasks scheduled
    /// with the force-processing hint.
    pub dry_run: bool,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            time_budget: None,
            batch_size: 50,
            stale_after: Duration::from_secs(60 * 60),
            dry_run: false,
        }
    }
}

/// Outcome of one drain run, for logging and operational visibility.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Pending tasks pulled from the backlog and considered.
    pub examined: usize,
    /// Tasks whose executor returned normally.
    pub succeeded: usize,
    /// Tasks whose executor reported a failure (or panicked).
    pub failed: usize,
    /// Tasks left `new`: no executor registered, dry-run, or lost claim race.
    pub skipped: usize,
    /// Stale `processing` rows re-queued before the walk.
    pub reclaimed: usize,
    /// Whether the run stopped because the time budget expired.
    pub budget_exhausted: bool,
    /// Total wall-clock time of the run.
    pub elapsed: Duration,
}

/// The consumer/worker loop over the shared task store.
pub struct TaskDrainer {
    dal: DAL,
    registry: Arc<ExecutorRegistry>,
    config: DrainConfig,
    instance_id: Uuid,
}

impl TaskDrainer {
    /// Creates a drainer over an explicit store handle and executor registry.
    pub fn new(dal: DAL, registry: Arc<ExecutorRegistry>, config: DrainConfig) -> Self {
        Self {
            dal,
            registry,
            config,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Runs one drain pass over the pending backlog.
    ///
    /// Returns a report of what happened. Only the store itself becoming
    /// unreachable aborts the run; every per-task failure is captured on the
    /// task and the walk continues.
    pub async fn drain(&self) -> Result<DrainReport, DrainError> {
        let started = Instant::now();
        let mut report = DrainReport::default();

        info!(instance = %self.instance_id, "Starting drain run");

        let stale_cutoff = crate::dal::now()
            - chrono::Duration::from_std(self.config.stale_after)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        report.reclaimed = self.dal.tasks().reclaim_stale(stale_cutoff).await?;

        let mut cursor = 0i64;
        'run: loop {
            let batch = self
                .dal
                .tasks()
                .next_pending(cursor, self.config.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            for task in batch {
                cursor = task.id;

                if let Some(budget) = self.config.time_budget {
                    if started.elapsed() >= budget {
                        report.budget_exhausted = true;
                        info!(
                            instance = %self.instance_id,
                            "Drain budget exhausted, stopping intake"
                        );
                        break 'run;
                    }
                }

                report.examined += 1;
                self.run_one(task, &mut report).await?;
            }
        }

        report.elapsed = started.elapsed();
        info!(
            instance = %self.instance_id,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            reclaimed = report.reclaimed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Drain run finished"
        );
        Ok(report)
    }

    /// Processes a single backlog entry. Per-task errors are absorbed into
    /// the report; only unreachable-store errors propagate.
    async fn run_one(&self, task: Task, report: &mut DrainReport) -> Result<(), DrainError> {
        let Some(executor) = self.registry.get(&task.task_type) else {
            warn!(
                task_id = task.id,
                task_type = %task.task_type,
                "No executor registered for task type, skipping"
            );
            report.skipped += 1;
            return Ok(());
        };

        if self.config.dry_run && !wants_forced_processing(&task) {
            debug!(task_id = task.id, "Dry run: leaving task pending");
            report.skipped += 1;
            return Ok(());
        }

        let claimed = match self.dal.tasks().start_processing(task.id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!(task_id = task.id, "Task claimed elsewhere, moving on");
                report.skipped += 1;
                return Ok(());
            }
            Err(e @ StorageError::ConnectionPool(_)) => return Err(e.into()),
            Err(e) => {
                error!(task_id = task.id, error = %e, "Failed to claim task");
                report.skipped += 1;
                return Ok(());
            }
        };

        let meta = match claimed.meta() {
            Ok(meta) => meta,
            Err(e) => {
                // The envelope is unreadable; fail the task with a decode
                // record so the operator sees it in the queue listing.
                let err =
                    ExecutorError::new("MetaDecodeError", e.to_string()).with_reference(reference());
                self.record_failure(&claimed, TaskMeta::default(), err, 0, report)
                    .await?;
                return Ok(());
            }
        };

        let attempt_started = Instant::now();
        let outcome = self.execute(executor, claimed.clone(), meta.payload.clone()).await;
        let duration_ms = attempt_started.elapsed().as_millis() as i64;

        match outcome {
            Ok(()) => {
                match self.dal.tasks().finish_success(claimed.id, duration_ms).await {
                    Ok(()) => {
                        info!(
                            task_id = claimed.id,
                            name = %claimed.name,
                            attempt = claimed.times_ran,
                            duration_ms,
                            "Task state change: processing -> success"
                        );
                        report.succeeded += 1;
                    }
                    Err(e @ StorageError::ConnectionPool(_)) => return Err(e.into()),
                    Err(StorageError::NoRowsAffected { .. }) => {
                        // Row lost to the purge policy mid-flight; the work
                        // itself completed, so count it and move on.
                        warn!(task_id = claimed.id, "Finished task vanished before update");
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        error!(task_id = claimed.id, error = %e, "Failed to record success");
                        let err = ExecutorError::new("StorageError", e.to_string())
                            .with_reference(reference());
                        self.record_failure(&claimed, meta, err, duration_ms, report)
                            .await?;
                    }
                }
            }
            Err(err) => {
                self.record_failure(&claimed, meta, err, duration_ms, report)
                    .await?;
            }
        }
        Ok(())
    }

    /// Runs the executor on its own tokio task so a panic is contained and
    /// mapped to a failure record instead of tearing down the drain run.
    async fn execute(
        &self,
        executor: Arc<dyn TaskExecutor>,
        task: Task,
        payload: Value,
    ) -> Result<(), ExecutorError> {
        let handle =
            tokio::spawn(async move { executor.execute(&task, &payload).await });
        match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(ExecutorError::new("ExecutorPanic", join_err.to_string())),
        }
    }

    /// Writes the failure outcome: error record into the envelope, task to
    /// `failed`. Storage problems while doing so are logged and absorbed so
    /// the walk continues.
    async fn record_failure(
        &self,
        task: &Task,
        mut meta: TaskMeta,
        err: ExecutorError,
        duration_ms: i64,
        report: &mut DrainReport,
    ) -> Result<(), DrainError> {
        let err = if err.reference.is_none() {
            err.with_reference(reference())
        } else {
            err
        };
        warn!(
            task_id = task.id,
            name = %task.name,
            attempt = task.times_ran,
            class = %err.class,
            reference = err.reference.as_deref().unwrap_or(""),
            "Task state change: processing -> failed ({})",
            err.message
        );
        meta.record_failure(ErrorRecord::from_executor_error(&err));

        let encoded = match meta.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(task_id = task.id, error = %e, "Failed to encode failure record");
                report.failed += 1;
                return Ok(());
            }
        };

        match self
            .dal
            .tasks()
            .finish_failure(task.id, duration_ms, encoded)
            .await
        {
            Ok(()) => {}
            Err(e @ StorageError::ConnectionPool(_)) => return Err(e.into()),
            Err(e) => {
                error!(task_id = task.id, error = %e, "Failed to record failure");
            }
        }
        report.failed += 1;
        Ok(())
    }
}

/// Fresh correlation id for a failure record.
fn reference() -> String {
    Uuid::new_v4().to_string()
}

fn wants_forced_processing(task: &Task) -> bool {
    task.meta().map(|m| m.force_processing).unwrap_or(false)
}
