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

//! Tests for the producer API and the deduplication-by-name invariant.

use serde_json::json;
use storesync::{TaskFilter, TaskScheduler, TaskStatus};

use crate::fixtures::{fixture, run_to_success};

#[tokio::test]
async fn test_dedup_burst_yields_single_pending_task() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    // A burst of webhook events for the same remote entity before any drain:
    // later calls are merges, not appends.
    for revision in 0..5 {
        scheduler
            .schedule_task("product-import", 42, json!({"revision": revision}), false)
            .await
            .expect("schedule");
    }

    let pending = f
        .dal
        .tasks()
        .count(TaskFilter {
            name: Some("product-import::42".to_string()),
            status: Some(TaskStatus::New),
            ..Default::default()
        })
        .await
        .expect("count");
    assert_eq!(pending, 1, "exactly one pending task per dedup name");

    let total = f.dal.tasks().count(TaskFilter::default()).await.expect("count");
    assert_eq!(total, 1, "merges must not append rows");

    // The surviving row carries the latest payload.
    let task = f
        .dal
        .tasks()
        .find_pending_by_name("product-import::42")
        .await
        .expect("lookup")
        .expect("pending task");
    assert_eq!(task.meta().unwrap().payload["revision"], 4);
}

#[tokio::test]
async fn test_distinct_subjects_do_not_dedup() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    scheduler
        .schedule_task("product-import", 1, json!({}), false)
        .await
        .expect("schedule");
    scheduler
        .schedule_task("product-import", 2, json!({}), false)
        .await
        .expect("schedule");

    let total = f.dal.tasks().count(TaskFilter::default()).await.expect("count");
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_terminal_task_does_not_block_new_one() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    let first = scheduler
        .schedule_task("product-import", 7, json!({"round": 1}), false)
        .await
        .expect("schedule");
    run_to_success(&f.dal, first.id).await;

    let second = scheduler
        .schedule_task("product-import", 7, json!({"round": 2}), false)
        .await
        .expect("schedule");

    assert_ne!(first.id, second.id, "terminal rows never absorb new work");
    assert_eq!(second.status().unwrap(), TaskStatus::New);

    let total = f.dal.tasks().count(TaskFilter::default()).await.expect("count");
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_schedule_derives_name_group_and_title() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    let task = scheduler
        .schedule_task("coupon-code-import", 99, json!({}), false)
        .await
        .expect("schedule");

    assert_eq!(task.name, "coupon-code-import::99");
    assert_eq!(task.type_group, "coupon-code");
    assert_eq!(task.title, "Coupon code import (#99)");
    assert_eq!(task.storekeeper_id, 99);
}

#[tokio::test]
async fn test_schedule_without_subject_keys_on_type() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    let task = scheduler
        .schedule_task("full-sync", 0, json!({}), false)
        .await
        .expect("schedule");

    assert_eq!(task.name, "full-sync");
    assert_eq!(task.storekeeper_id, 0);
}

#[tokio::test]
async fn test_reschedule_uses_caller_chosen_name() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    // A parent-product recalculation keyed on the parent, regardless of
    // which child triggered it.
    let first = scheduler
        .reschedule_task(
            "parent-product-recalculate",
            "shop_product_id::123",
            json!({"trigger": "child-1"}),
        )
        .await
        .expect("reschedule");
    let second = scheduler
        .reschedule_task(
            "parent-product-recalculate",
            "shop_product_id::123",
            json!({"trigger": "child-2"}),
        )
        .await
        .expect("reschedule");

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "shop_product_id::123");

    let total = f.dal.tasks().count(TaskFilter::default()).await.expect("count");
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_force_processing_hint_is_persisted() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    let task = scheduler
        .schedule_task("order-export", 11, json!({}), true)
        .await
        .expect("schedule");

    assert!(task.meta().unwrap().force_processing);
    // The hint never changes the state machine.
    assert_eq!(task.status().unwrap(), TaskStatus::New);
}
