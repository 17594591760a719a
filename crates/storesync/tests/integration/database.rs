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

//! Tests for the database layer against a file-backed store.

use serde_json::json;
use storesync::database::Database;
use storesync::{TaskScheduler, DAL};

#[tokio::test]
async fn test_file_backed_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storesync.db");
    let url = path.to_string_lossy().to_string();

    {
        let database = Database::new(&url);
        database.run_migrations().await.expect("migrations");
        TaskScheduler::new(DAL::new(database))
            .schedule_task("product-import", 1, json!({}), false)
            .await
            .expect("schedule");
    }

    // Reopen the same file: migrations are idempotent and the row is durable.
    let database = Database::new(&url);
    database.run_migrations().await.expect("migrations rerun");
    let dal = DAL::new(database);

    let task = dal
        .tasks()
        .find_pending_by_name("product-import::1")
        .await
        .expect("lookup")
        .expect("task persisted across reopen");
    assert_eq!(task.task_type, "product-import");
}
