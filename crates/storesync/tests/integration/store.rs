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

//! Tests for the task record store and webhook log store contracts.

use serde_json::json;
use storesync::{
    NewTask, NewWebhookLog, QueueError, StorageError, TaskFilter, TaskMeta, TaskOrder, TaskStatus,
    UpdateTask, ValidationError, WebhookLogFilter, WebhookLogOrder,
};

use crate::fixtures::fixture;

fn new_task(name: &str, task_type: &str, storekeeper_id: i64) -> NewTask {
    NewTask {
        name: name.to_string(),
        title: format!("Test {}", name),
        task_type: task_type.to_string(),
        type_group: "test".to_string(),
        storekeeper_id,
        meta: TaskMeta::new(json!({"seed": true})),
    }
}

#[tokio::test]
async fn test_create_stamps_timestamps_and_initial_state() {
    let f = fixture().await;

    let task = f
        .dal
        .tasks()
        .create(new_task("product-import::1", "product-import", 1))
        .await
        .expect("create");

    assert_eq!(task.status().unwrap(), TaskStatus::New);
    assert_eq!(task.times_ran, 0);
    assert_eq!(task.date_created, task.date_updated);
    assert!(task.execution_duration_ms.is_none());
}

#[tokio::test]
async fn test_create_rejects_blank_required_field() {
    let f = fixture().await;

    let err = f
        .dal
        .tasks()
        .create(new_task("", "product-import", 1))
        .await
        .expect_err("blank name must be rejected");

    assert!(matches!(
        err,
        QueueError::Validation(ValidationError::BlankField { field: "name" })
    ));
}

#[tokio::test]
async fn test_get_by_id_not_found() {
    let f = fixture().await;

    let err = f.dal.tasks().get_by_id(9999).await.expect_err("no row");
    assert!(matches!(
        err,
        StorageError::NotFound { entity: "task", id: 9999 }
    ));
}

#[tokio::test]
async fn test_update_stamps_date_updated() {
    let f = fixture().await;
    let task = f
        .dal
        .tasks()
        .create(new_task("order-export::7", "order-export", 7))
        .await
        .expect("create");

    f.dal
        .tasks()
        .update(
            task.id,
            UpdateTask {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    let reloaded = f.dal.tasks().get_by_id(task.id).await.expect("reload");
    assert_eq!(reloaded.title, "Renamed");
    assert!(reloaded.date_updated > task.date_updated);
    assert_eq!(reloaded.date_created, task.date_created);
}

#[tokio::test]
async fn test_update_missing_row_reports_no_rows_affected() {
    let f = fixture().await;

    let err = f
        .dal
        .tasks()
        .update(
            424242,
            UpdateTask {
                title: Some("ghost".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("update of a vanished row must surface");

    assert!(matches!(
        err,
        QueueError::Storage(StorageError::NoRowsAffected { entity: "task", id: 424242 })
    ));
}

#[tokio::test]
async fn test_update_rejects_blanked_required_field() {
    let f = fixture().await;
    let task = f
        .dal
        .tasks()
        .create(new_task("order-export::9", "order-export", 9))
        .await
        .expect("create");

    let err = f
        .dal
        .tasks()
        .update(
            task.id,
            UpdateTask {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("blanking name must be rejected");

    assert!(matches!(
        err,
        QueueError::Validation(ValidationError::BlankField { field: "name" })
    ));
}

#[tokio::test]
async fn test_upsert_identical_fields_is_a_noop() {
    let f = fixture().await;
    let fields = new_task("product-import::3", "product-import", 3);

    let created = f
        .dal
        .tasks()
        .create(fields.clone())
        .await
        .expect("create");

    let merged = f
        .dal
        .tasks()
        .upsert(fields, Some(&created))
        .await
        .expect("upsert");

    assert_eq!(merged.id, created.id);
    assert_eq!(merged.date_updated, created.date_updated);
}

#[tokio::test]
async fn test_upsert_with_changed_field_writes_through() {
    let f = fixture().await;
    let created = f
        .dal
        .tasks()
        .create(new_task("product-import::4", "product-import", 4))
        .await
        .expect("create");

    let mut fields = new_task("product-import::4", "product-import", 4);
    fields.meta = TaskMeta::new(json!({"seed": false, "extra": 1}));

    let merged = f
        .dal
        .tasks()
        .upsert(fields, Some(&created))
        .await
        .expect("upsert");

    assert_eq!(merged.id, created.id);
    assert!(merged.date_updated > created.date_updated);
    assert_eq!(merged.meta().unwrap().payload["extra"], 1);
}

#[tokio::test]
async fn test_find_by_filters_order_and_limit() {
    let f = fixture().await;
    let tasks = f.dal.tasks();

    for i in 1..=4 {
        tasks
            .create(new_task(
                &format!("product-import::{}", i),
                "product-import",
                i,
            ))
            .await
            .expect("create");
    }
    tasks
        .create(new_task("order-export::1", "order-export", 1))
        .await
        .expect("create");

    let products = tasks
        .find_by(
            TaskFilter {
                task_type: Some("product-import".to_string()),
                ..Default::default()
            },
            TaskOrder::IdDesc,
            2,
            0,
        )
        .await
        .expect("find");
    assert_eq!(products.len(), 2);
    assert!(products[0].id > products[1].id);

    let by_fragment = tasks
        .find_by(
            TaskFilter {
                name_like: Some("order-export".to_string()),
                ..Default::default()
            },
            TaskOrder::CreatedAsc,
            10,
            0,
        )
        .await
        .expect("find");
    assert_eq!(by_fragment.len(), 1);

    let count = tasks
        .count(TaskFilter {
            task_type: Some("product-import".to_string()),
            ..Default::default()
        })
        .await
        .expect("count");
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_webhook_log_create_and_list() {
    let f = fixture().await;
    let logs = f.dal.webhook_logs();

    for action in ["products::updated", "orders::new", "products::updated"] {
        logs.create(NewWebhookLog {
            route: "/webhooks/events".to_string(),
            method: "POST".to_string(),
            action: action.to_string(),
            body: r#"{"id": 1}"#.to_string(),
            headers: None,
            response_code: 200,
        })
        .await
        .expect("create log");
    }

    let updated = logs
        .find_by(
            WebhookLogFilter {
                action: Some("products::updated".to_string()),
                ..Default::default()
            },
            WebhookLogOrder::CreatedDesc,
            10,
            0,
        )
        .await
        .expect("find");
    assert_eq!(updated.len(), 2);

    let total = logs.count(WebhookLogFilter::default()).await.expect("count");
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_webhook_log_rejects_blank_route() {
    let f = fixture().await;

    let err = f
        .dal
        .webhook_logs()
        .create(NewWebhookLog {
            route: "".to_string(),
            method: "POST".to_string(),
            action: "noop".to_string(),
            body: String::new(),
            headers: None,
            response_code: 200,
        })
        .await
        .expect_err("blank route must be rejected");

    assert!(matches!(
        err,
        QueueError::Validation(ValidationError::BlankField { field: "route" })
    ));
}
