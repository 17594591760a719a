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

//! Webhook Log Data Access Layer
//!
//! Append-only writes from the webhook ingestion layer plus the read and
//! purge surfaces. The queue never updates these rows; the only deletions
//! come from the retention policy, which shares its shape with the task
//! table's policy.

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::webhook_logs;
use crate::error::{QueueError, StorageError, ValidationError};
use crate::models::webhook_log::{NewWebhookLog, NewWebhookLogRow, WebhookLog};

/// Equality/LIKE filters joined by AND for admin-facing listings.
#[derive(Debug, Clone, Default)]
pub struct WebhookLogFilter {
    pub route: Option<String>,
    pub method: Option<String>,
    pub action: Option<String>,
    pub response_code: Option<i32>,
    pub route_like: Option<String>,
}

/// Mandatory ordering for webhook log listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookLogOrder {
    CreatedAsc,
    CreatedDesc,
}

/// Data Access Layer for webhook log records.
#[derive(Clone)]
pub struct WebhookLogDAL<'a> {
    pub(crate) dal: &'a DAL,
}

impl<'a> WebhookLogDAL<'a> {
    async fn conn(
        &self,
    ) -> Result<deadpool::managed::Object<deadpool_diesel::sqlite::Manager>, StorageError> {
        self.dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }

    /// Appends one inbound-call record.
    pub async fn create(&self, new_log: NewWebhookLog) -> Result<WebhookLog, QueueError> {
        validate_new(&new_log)?;

        let now = super::now();
        let row = NewWebhookLogRow {
            route: new_log.route,
            method: new_log.method,
            action: new_log.action,
            body: new_log.body,
            headers: new_log.headers,
            response_code: new_log.response_code,
            date_created: now,
            date_updated: now,
        };

        let conn = self.conn().await?;
        let log: WebhookLog = conn
            .interact(move |conn| {
                diesel::insert_into(webhook_logs::table)
                    .values(&row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
            .map_err(QueueError::from)?
            .map_err(StorageError::from)?;

        tracing::debug!(log_id = log.id, route = %log.route, "Webhook call logged");
        Ok(log)
    }

    /// Retrieves a specific log row by its id.
    pub async fn get_by_id(&self, log_id: i64) -> Result<WebhookLog, StorageError> {
        let conn = self.conn().await?;

        let log: Option<WebhookLog> = conn
            .interact(move |conn| webhook_logs::table.find(log_id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        log.ok_or(StorageError::NotFound {
            entity: "webhook log",
            id: log_id,
        })
    }

    /// Lists log rows matching the filter, bounded by order and limit.
    pub async fn find_by(
        &self,
        filter: WebhookLogFilter,
        order: WebhookLogOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookLog>, StorageError> {
        let conn = self.conn().await?;

        let rows: Vec<WebhookLog> = conn
            .interact(move |conn| {
                let mut query = filtered(filter);
                query = match order {
                    WebhookLogOrder::CreatedAsc => {
                        query.order((webhook_logs::date_created.asc(), webhook_logs::id.asc()))
                    }
                    WebhookLogOrder::CreatedDesc => {
                        query.order((webhook_logs::date_created.desc(), webhook_logs::id.desc()))
                    }
                };
                query.limit(limit).offset(offset).load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Counts log rows matching the filter.
    pub async fn count(&self, filter: WebhookLogFilter) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(move |conn| filtered(filter).count().get_result(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    // ---- retention support --------------------------------------------

    /// Counts every row in the table.
    pub async fn count_all(&self) -> Result<i64, StorageError> {
        let conn = self.conn().await?;

        let count: i64 = conn
            .interact(|conn| webhook_logs::table.count().get_result(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Deletes rows created before the cutoff. Every webhook log is purge
    /// eligible; the audit trail has no in-flight state to protect.
    pub async fn delete_older_than(
        &self,
        cutoff: chrono::NaiveDateTime,
    ) -> Result<usize, StorageError> {
        let conn = self.conn().await?;

        let removed: usize = conn
            .interact(move |conn| {
                diesel::delete(webhook_logs::table.filter(webhook_logs::date_created.lt(cutoff)))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Returns the id of the `n`-th most recently created row, or `None`
    /// when fewer than `n` rows exist.
    pub async fn nth_newest_id(&self, n: i64) -> Result<Option<i64>, StorageError> {
        let conn = self.conn().await?;

        let id: Option<i64> = conn
            .interact(move |conn| {
                webhook_logs::table
                    .select(webhook_logs::id)
                    .order(webhook_logs::id.desc())
                    .offset(n - 1)
                    .limit(1)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(id)
    }

    /// Deletes rows with ids below the cutoff id.
    pub async fn delete_below(&self, id_cutoff: i64) -> Result<usize, StorageError> {
        let conn = self.conn().await?;

        let removed: usize = conn
            .interact(move |conn| {
                diesel::delete(webhook_logs::table.filter(webhook_logs::id.lt(id_cutoff)))
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }
}

type BoxedLogQuery = webhook_logs::BoxedQuery<'static, diesel::sqlite::Sqlite>;

fn filtered(filter: WebhookLogFilter) -> BoxedLogQuery {
    let mut query = webhook_logs::table.into_boxed();
    if let Some(route) = filter.route {
        query = query.filter(webhook_logs::route.eq(route));
    }
    if let Some(method) = filter.method {
        query = query.filter(webhook_logs::method.eq(method));
    }
    if let Some(action) = filter.action {
        query = query.filter(webhook_logs::action.eq(action));
    }
    if let Some(code) = filter.response_code {
        query = query.filter(webhook_logs::response_code.eq(code));
    }
    if let Some(fragment) = filter.route_like {
        query = query.filter(webhook_logs::route.like(format!("%{}%", fragment)));
    }
    query
}

fn validate_new(new_log: &NewWebhookLog) -> Result<(), ValidationError> {
    if new_log.route.trim().is_empty() {
        return Err(ValidationError::BlankField { field: "route" });
    }
    if new_log.method.trim().is_empty() {
        return Err(ValidationError::BlankField { field: "method" });
    }
    Ok(())
}
