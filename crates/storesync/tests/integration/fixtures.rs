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

//! Test fixtures: fresh in-memory databases and row-manipulation helpers.

use diesel::prelude::*;
use storesync::database::schema::{tasks, webhook_logs};
use storesync::database::Database;
use storesync::{Task, DAL};

/// A fresh, migrated in-memory database per test.
pub struct TestFixture {
    pub database: Database,
    pub dal: DAL,
}

pub async fn fixture() -> TestFixture {
    storesync::init_logging(Some("warn"));

    let database = Database::new(":memory:");
    database
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    let dal = DAL::new(database.clone());

    TestFixture { database, dal }
}

/// Backdates a task's creation/update timestamps, for retention and rate
/// scenarios the DAL itself would always stamp with "now".
pub async fn backdate_task(
    database: &Database,
    task_id: i64,
    created_days_ago: i64,
    updated_days_ago: i64,
) {
    let now = chrono::Utc::now().naive_utc();
    let created = now - chrono::Duration::days(created_days_ago);
    let updated = now - chrono::Duration::days(updated_days_ago);

    let conn = database.get_connection().await.expect("connection");
    conn.interact(move |conn| {
        diesel::update(tasks::table.find(task_id))
            .set((
                tasks::date_created.eq(created),
                tasks::date_updated.eq(updated),
            ))
            .execute(conn)
    })
    .await
    .expect("interact")
    .expect("backdate task");
}

/// Backdates a webhook log's creation timestamp.
pub async fn backdate_webhook_log(database: &Database, log_id: i64, created_days_ago: i64) {
    let created = chrono::Utc::now().naive_utc() - chrono::Duration::days(created_days_ago);

    let conn = database.get_connection().await.expect("connection");
    conn.interact(move |conn| {
        diesel::update(webhook_logs::table.find(log_id))
            .set(webhook_logs::date_created.eq(created))
            .execute(conn)
    })
    .await
    .expect("interact")
    .expect("backdate webhook log");
}

/// Drives a pending task straight to `success` through the sanctioned
/// transitions.
pub async fn run_to_success(dal: &DAL, task_id: i64) -> Task {
    let claimed = dal
        .tasks()
        .start_processing(task_id)
        .await
        .expect("claim")
        .expect("task should be pending");
    dal.tasks()
        .finish_success(claimed.id, 5)
        .await
        .expect("finish");
    dal.tasks().get_by_id(task_id).await.expect("reload")
}

/// Drives a pending task straight to `failed`.
pub async fn run_to_failure(dal: &DAL, task_id: i64) -> Task {
    let claimed = dal
        .tasks()
        .start_processing(task_id)
        .await
        .expect("claim")
        .expect("task should be pending");
    let mut meta = claimed.meta().expect("meta");
    meta.record_failure(storesync::ErrorRecord {
        class: "TestFailure".to_string(),
        message: "induced".to_string(),
        trace: String::new(),
        reference: None,
    });
    dal.tasks()
        .finish_failure(claimed.id, 5, meta.encode().expect("encode"))
        .await
        .expect("finish");
    dal.tasks().get_by_id(task_id).await.expect("reload")
}
