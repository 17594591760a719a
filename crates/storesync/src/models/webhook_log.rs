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

//! Webhook Log Model
//!
//! Append-only audit records of inbound calls from the remote backoffice.
//! Rows are written once by the webhook ingestion layer and only ever touched
//! again by the retention policy (delete). There is no foreign key to tasks;
//! a log entry and the tasks it fanned out into are correlated by time
//! proximity and embedded remote identifiers.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Represents one inbound HTTP call from the remote system.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::webhook_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WebhookLog {
    pub id: i64,
    /// Request path the remote system called
    pub route: String,
    /// HTTP method
    pub method: String,
    /// Logical webhook action parsed from the route/body
    pub action: String,
    /// Raw request body
    pub body: String,
    /// Retained request headers, if any
    pub headers: Option<String>,
    /// HTTP status code returned to the caller
    pub response_code: i32,
    pub date_created: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}

/// Fields supplied by the webhook ingestion layer for a new log row.
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub route: String,
    pub method: String,
    pub action: String,
    pub body: String,
    pub headers: Option<String>,
    pub response_code: i32,
}

/// Insertable row built by the DAL from a [`NewWebhookLog`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::webhook_logs)]
pub(crate) struct NewWebhookLogRow {
    pub route: String,
    pub method: String,
    pub action: String,
    pub body: String,
    pub headers: Option<String>,
    pub response_code: i32,
    pub date_created: NaiveDateTime,
    pub date_updated: NaiveDateTime,
}
