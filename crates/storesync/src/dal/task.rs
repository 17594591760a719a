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

//! Task Record Data Access Layer
//!
//! CRUD, filtered listing, and the guarded status transitions the drainer and
//! the operator actions are built on. Key behaviors:
//!
//! - Required-field validation before every write
//! - `upsert` writes only when a field actually differs (no `date_updated`
//!   churn when re-synchronizing unchanged data)
//! - The `new -> processing` transition is guarded by a status predicate so
//!   concurrent drainers skip rather than double-claim
//! - Zero rows affected on an expected update surfaces as
//!   `StorageError::NoRowsAffected` (a benign race with the purge policy)

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::tasks;
use crate::error::{QueueError, StorageError, ValidationError};
use crate::models::task::{NewTask, NewTaskRow, Task, TaskStatus, UpdateTask};

/// Equality/LIKE filters joined by AND for admin-facing listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<String>,
    pub type_group: Option<String>,
    pub name: Option<String>,
    pub name_like: Option<String>,
    pub storekeeper_id: Option<i64>,
}

/// Mandatory ordering for any listing, to keep scans bounded and stable.
///
/// Ties are always broken by id, which follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    CreatedAsc,
    CreatedDesc,
    UpdatedDesc,
    IdAsc,
    IdDesc,
}

/// Data Access Layer for task records.
#[derive(Clone)]
pub struct TaskDAL<'a> {
    pub(crate) dal: &'a DAL,
}

impl<'a> TaskDAL<'a> {
    async fn conn(
        &self,
    ) -> Result<deadpool::managed::Object<deadpool_diesel::sqlite::Manager>, StorageError> {
        self.dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }

    /// Creates a new task record in the `new` state.
    ///
    /// Fails with a `ValidationError` when a required field is blank and a
    /// `StorageError` when the insert is rejected. Both timestamps are
    /// stamped here.
    pub async fn create(&self, new_task: NewTask) -> Result<Task, QueueError> {
        validate_new(&new_task)?;

        let now = super::now();
        let row = NewTaskRow {
            name: new_task.name,
            title: new_task.title,
            task_type: new_task.task_type,
            type_group: new_task.type_group,
            storekeeper_id: new_task.storekeeper_id,
            status: TaskStatus::New.as_str().to_string(),
            times_ran: 0,
            meta_data: new_task.meta.encode()?,
            date_created: now,
            date_updated: now,
        };

        let conn = self.conn().await?;
        let task: Task = conn
            .interact(move |conn| {
                diesel::insert_into(tasks::table)
                    .values(&row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
            .map_err(QueueError::from)?
            .map_err(StorageError::from)?;

        tracing::debug!(task_id = task.id, name = %task.name, "Task created");
        Ok(task)
    }

    /// Retrieves a specific task by its id.
    pub async fn get_by_id(&self, task_id: i64) -> Result<Task, StorageError> {
        let conn = self.conn().await?;

        let task: Option<Task> = conn
            .interact(move |conn| tasks::table.find(task_id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        task.ok_or(StorageError::NotFound {
            entity: "task",
            id: task_id,
        })
    }

    /// Applies a partial update, stamping `date_updated`.
    ///
    /// Explicitly blanking a required field is a `ValidationError`; zero rows
    /// affected means the row vanished underneath the caller and surfaces as
    /// `StorageError::NoRowsAffected`.
    pub async fn update(&self, task_id: i64, mut fields: UpdateTask) -> Result<(), QueueError> {
        validate_update(&fields)?;
        fields.date_updated = Some(super::now());

        let conn = self.conn().await?;
        let affected: usize = conn
            .interact(move |conn| {
                diesel::update(tasks::table.find(task_id))
                    .set(&fields)
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
            .map_err(QueueError::from)?
            .map_err(StorageError::from)?;

        if affected == 0 {
            return Err(StorageError::NoRowsAffected {
                entity: "task",
                id: task_id,
            }
            .into());
        }
        Ok(())
    }

    /// Lists tasks matching the filter. Ordering and limit are mandatory to
    /// keep admin-facing scans bounded.
    pub async fn find_by(
        &self,
        filter: TaskFilter,
        order: TaskOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, StorageError> {
        let conn = self.conn().await?;

        let rows: Vec<Task> = conn
            .interact(move |conn| {
                let mut query = filtered(filter);
                query = match order {
                    TaskOrder::CreatedAsc => {
                        query.order((tasks::date_created.asc(), tasks::id.asc()))
                    }
                    TaskOrder::CreatedDesc => {
                        query.order((tasks::date_created.desc(), tasks::id.desc()))
                    }
                    TaskOrder::UpdatedDesc => {
                        query.order((tasks::date_updated.desc(), tasks::id.desc()))
                    }
                    TaskOrder::IdAsc => query.order(tasks::id.asc()),
                    TaskOrder::IdDesc => query.order(tasks::id.desc()),
                };
                query.limit(limit).offset(offset).load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Counts tasks matching the filter.
    pub async fn count(&self, filter: TaskFilter) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(move |conn| filtered(filter).count().get_result(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Creates the task, or merges it into `existing` when a row is supplied.
    ///
    /// The merge is a field-by-field diff: when nothing differs, no write is
    /// issued at all and `date_updated` is untouched.
    pub async fn upsert(
        &self,
        new_task: NewTask,
        existing: Option<&Task>,
    ) -> Result<Task, QueueError> {
        let Some(existing) = existing else {
            return self.create(new_task).await;
        };

        validate_new(&new_task)?;
        let meta_data = new_task.meta.encode()?;

        let mut changes = UpdateTask::default();
        let mut dirty = false;
        if existing.name != new_task.name {
            changes.name = Some(new_task.name);
            dirty = true;
        }
        if existing.title != new_task.title {
            changes.title = Some(new_task.title);
            dirty = true;
        }
        if existing.meta_data != meta_data {
            changes.meta_data = Some(meta_data);
            dirty = true;
        }

        if !dirty {
            tracing::debug!(task_id = existing.id, "Upsert found no changes");
            return Ok(existing.clone());
        }

        self.update(existing.id, changes).await?;
        Ok(self.get_by_id(existing.id).await?)
    }

    /// Looks up the pending (`new`) task carrying the given dedup name.
    pub async fn find_pending_by_name(&self, name: &str) -> Result<Option<Task>, StorageError> {
        let conn = self.conn().await?;

        let name = name.to_string();
        let task: Option<Task> = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::name.eq(&name))
                    .filter(tasks::status.eq(TaskStatus::New.as_str()))
                    .order(tasks::id.asc())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(task)
    }

    /// Returns the next chunk of the pending backlog in creation order,
    /// strictly after `after_id`. The id cursor keeps a drain run from
    /// refetching tasks it already skipped.
    pub async fn next_pending(&self, after_id: i64, limit: i64) -> Result<Vec<Task>, StorageError> {
        let conn = self.conn().await?;

        let rows: Vec<Task> = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::status.eq(TaskStatus::New.as_str()))
                    .filter(tasks::id.gt(after_id))
                    .order(tasks::id.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Atomically claims a pending task: `new -> processing`, incrementing
    /// the attempt counter.
    ///
    /// The status predicate makes the transition a guarded compare-and-set;
    /// `None` means another drainer (or an operator) got there first, and the
    /// caller just moves on.
    pub async fn start_processing(&self, task_id: i64) -> Result<Option<Task>, StorageError> {
        let conn = self.conn().await?;

        let now = super::now();
        let claimed: Option<Task> = conn
            .interact(move |conn| {
                diesel::update(
                    tasks::table
                        .filter(tasks::id.eq(task_id))
                        .filter(tasks::status.eq(TaskStatus::New.as_str())),
                )
                .set((
                    tasks::status.eq(TaskStatus::Processing.as_str()),
                    tasks::times_ran.eq(tasks::times_ran + 1),
                    tasks::date_updated.eq(now),
                ))
                .get_result(conn)
                .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if let Some(ref task) = claimed {
            tracing::debug!(
                task_id = task.id,
                attempt = task.times_ran,
                "Task state change: new -> processing"
            );
        }
        Ok(claimed)
    }

    /// Finishes a processing task successfully, recording the attempt's
    /// wall-clock duration.
    pub async fn finish_success(
        &self,
        task_id: i64,
        duration_ms: i64,
    ) -> Result<(), StorageError> {
        let conn = self.conn().await?;

        let now = super::now();
        let affected: usize = conn
            .interact(move |conn| {
                diesel::update(tasks::table.find(task_id))
                    .set((
                        tasks::status.eq(TaskStatus::Success.as_str()),
                        tasks::execution_duration_ms.eq(Some(duration_ms)),
                        tasks::date_updated.eq(now),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if affected == 0 {
            return Err(StorageError::NoRowsAffected {
                entity: "task",
                id: task_id,
            });
        }
        tracing::debug!(task_id, "Task state change: processing -> success");
        Ok(())
    }

    /// Finishes a processing task as failed, writing the updated meta-data
    /// envelope (carrying the latest error record) and the attempt duration.
    pub async fn finish_failure(
        &self,
        task_id: i64,
        duration_ms: i64,
        meta_data: String,
    ) -> Result<(), StorageError> {
        let conn = self.conn().await?;

        let now = super::now();
        let affected: usize = conn
            .interact(move |conn| {
                diesel::update(tasks::table.find(task_id))
                    .set((
                        tasks::status.eq(TaskStatus::Failed.as_str()),
                        tasks::meta_data.eq(&meta_data),
                        tasks::execution_duration_ms.eq(Some(duration_ms)),
                        tasks::date_updated.eq(now),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if affected == 0 {
            return Err(StorageError::NoRowsAffected {
                entity: "task",
                id: task_id,
            });
        }
        tracing::debug!(task_id, "Task state change: processing -> failed");
        Ok(())
    }

    /// Operator action: resets failed tasks back to `new` for re-execution.
    /// Returns the number of rows actually reset.
    pub async fn reset_for_retry(&self, task_ids: Vec<i64>) -> Result<usize, StorageError> {
        self.transition_failed(task_ids, TaskStatus::New).await
    }

    /// Operator action: forces failed tasks to `success` without re-executing
    /// (the effect has been verified out-of-band). Returns rows affected.
    pub async fn force_success(&self, task_ids: Vec<i64>) -> Result<usize, StorageError> {
        self.transition_failed(task_ids, TaskStatus::Success).await
    }

    async fn transition_failed(
        &self,
        task_ids: Vec<i64>,
        to: TaskStatus,
    ) -> Result<usize, StorageError> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn().await?;

        let now = super::now();
        let affected: usize = conn
            .interact(move |conn| {
                diesel::update(
                    tasks::table
                        .filter(tasks::id.eq_any(task_ids))
                        .filter(tasks::status.eq(TaskStatus::Failed.as_str())),
                )
                .set((tasks::status.eq(to.as_str()), tasks::date_updated.eq(now)))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        tracing::info!(affected, to = %to, "Operator transition applied to failed tasks");
        Ok(affected)
    }

    /// Re-queues `processing` rows whose `date_updated` predates the cutoff.
    ///
    /// A drainer that crashed mid-run leaves its in-flight task stranded in
    /// `processing`; there is no heartbeat, so age is the staleness signal.
    pub async fn reclaim_stale(
        &self,
        cutoff: chrono::NaiveDateTime,
    ) -> Result<usize, StorageError> {
        let conn = self.conn().await?;

        let now = super::now();
        let affected: usize = conn
            .interact(move |conn| {
                diesel::update(
                    tasks::table
                        .filter(tasks::status.eq(TaskStatus::Processing.as_str()))
                        .filter(tasks::date_updated.lt(cutoff)),
                )
                .set((
                    tasks::status.eq(TaskStatus::New.as_str()),
                    tasks::date_updated.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if affected > 0 {
            tracing::warn!(affected, "Reclaimed stale processing tasks back to new");
        }
        Ok(affected)
    }

    // ---- retention / rate support -------------------------------------

    /// Counts every row in the table, regardless of status.
    pub async fn count_all(&self) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(|conn| tasks::table.count().get_result(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Deletes purge-eligible rows created before the cutoff.
    pub async fn delete_purgeable_older_than(
        &self,
        cutoff: chrono::NaiveDateTime,
    ) -> Result<usize, StorageError> {
        let conn = self.conn().await?;

        let removed: usize = conn
            .interact(move |conn| {
                diesel::delete(
                    tasks::table
                        .filter(tasks::status.eq_any(TaskStatus::purgeable_strs()))
                        .filter(tasks::date_created.lt(cutoff)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Returns the id of the `n`-th most recently created purge-eligible row,
    /// or `None` when fewer than `n` such rows exist.
    pub async fn nth_newest_purgeable_id(&self, n: i64) -> Result<Option<i64>, StorageError> {
        let conn = self.conn().await?;

        let id: Option<i64> = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::status.eq_any(TaskStatus::purgeable_strs()))
                    .select(tasks::id)
                    .order(tasks::id.desc())
                    .offset(n - 1)
                    .limit(1)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(id)
    }

    /// Deletes purge-eligible rows with ids below the cutoff id.
    pub async fn delete_purgeable_below(&self, id_cutoff: i64) -> Result<usize, StorageError> {
        let conn = self.conn().await?;

        let removed: usize = conn
            .interact(move |conn| {
                diesel::delete(
                    tasks::table
                        .filter(tasks::status.eq_any(TaskStatus::purgeable_strs()))
                        .filter(tasks::id.lt(id_cutoff)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Counts tasks created inside `(from, to]`, the incoming-rate query.
    pub async fn count_created_between(
        &self,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::date_created.gt(from))
                    .filter(tasks::date_created.le(to))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Counts tasks that reached a terminal state inside `(from, to]`, the
    /// processed-rate query. Terminal rows are only ever touched again by
    /// operator actions, so `date_updated` is the transition timestamp.
    pub async fn count_finished_between(
        &self,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::status.eq_any(TaskStatus::terminal_strs()))
                    .filter(tasks::date_updated.gt(from))
                    .filter(tasks::date_updated.le(to))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}

type BoxedTaskQuery = tasks::BoxedQuery<'static, diesel::sqlite::Sqlite>;

fn filtered(filter: TaskFilter) -> BoxedTaskQuery {
    let mut query = tasks::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(tasks::status.eq(status.as_str()));
    }
    if let Some(task_type) = filter.task_type {
        query = query.filter(tasks::task_type.eq(task_type));
    }
    if let Some(type_group) = filter.type_group {
        query = query.filter(tasks::type_group.eq(type_group));
    }
    if let Some(name) = filter.name {
        query = query.filter(tasks::name.eq(name));
    }
    if let Some(fragment) = filter.name_like {
        query = query.filter(tasks::name.like(format!("%{}%", fragment)));
    }
    if let Some(storekeeper_id) = filter.storekeeper_id {
        query = query.filter(tasks::storekeeper_id.eq(storekeeper_id));
    }
    query
}

fn validate_new(new_task: &NewTask) -> Result<(), ValidationError> {
    require("name", &new_task.name)?;
    require("title", &new_task.title)?;
    require("task_type", &new_task.task_type)?;
    require("type_group", &new_task.type_group)?;
    Ok(())
}

fn validate_update(fields: &UpdateTask) -> Result<(), ValidationError> {
    if let Some(name) = &fields.name {
        require("name", name)?;
    }
    if let Some(title) = &fields.title {
        require("title", title)?;
    }
    if let Some(meta_data) = &fields.meta_data {
        require("meta_data", meta_data)?;
    }
    if let Some(status) = &fields.status {
        TaskStatus::parse(status)?;
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(())
}
