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

//! Data Access Layer
//!
//! This module provides the data access layer for the two queue tables. Every
//! mutation is a single atomic statement against the backing store; no
//! multi-statement transactions are assumed, so higher layers re-derive their
//! invariants from a consistent read immediately before the corresponding
//! write.

use chrono::NaiveDateTime;

use crate::database::Database;

pub mod task;
pub mod webhook_log;

pub use task::{TaskDAL, TaskFilter, TaskOrder};
pub use webhook_log::{WebhookLogDAL, WebhookLogFilter, WebhookLogOrder};

/// Returns the current timestamp used for all row stamping.
pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// The main Data Access Layer struct.
///
/// Hands out per-table DALs sharing one database handle. The handle is passed
/// in explicitly; there is no ambient global connection.
#[derive(Clone)]
pub struct DAL {
    pub(crate) database: Database,
}

impl DAL {
    /// Creates a new DAL instance over the provided database handle.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a TaskDAL instance for task-record operations.
    pub fn tasks(&self) -> TaskDAL {
        TaskDAL { dal: self }
    }

    /// Returns a WebhookLogDAL instance for webhook-log operations.
    pub fn webhook_logs(&self) -> WebhookLogDAL {
        WebhookLogDAL { dal: self }
    }
}
