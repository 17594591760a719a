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

//! Tests for the two-tier retention policy over both stores.
//!
//! The default policy is 30d/1000/7d; tests shrink the cap so the overflow
//! tier is exercised without thousands of rows.

use serde_json::json;
use storesync::{
    NewWebhookLog, QueuePurger, RetentionPolicy, TaskFilter, TaskScheduler, TaskStatus,
};

use crate::fixtures::{backdate_task, backdate_webhook_log, fixture, run_to_failure, run_to_success};

async fn seed_success(f: &crate::fixtures::TestFixture, subject: i64) -> i64 {
    let task = TaskScheduler::new(f.dal.clone())
        .schedule_task("product-import", subject, json!({}), false)
        .await
        .expect("schedule");
    run_to_success(&f.dal, task.id).await;
    task.id
}

#[tokio::test]
async fn test_non_successful_records_are_never_purged() {
    let f = fixture().await;
    let scheduler = TaskScheduler::new(f.dal.clone());

    let pending = scheduler
        .schedule_task("product-import", 1, json!({}), false)
        .await
        .expect("schedule");

    let in_flight = scheduler
        .schedule_task("product-import", 2, json!({}), false)
        .await
        .expect("schedule");
    f.dal
        .tasks()
        .start_processing(in_flight.id)
        .await
        .expect("claim")
        .expect("pending");

    let failed = scheduler
        .schedule_task("product-import", 3, json!({}), false)
        .await
        .expect("schedule");
    run_to_failure(&f.dal, failed.id).await;

    // Ancient by any tier of the policy.
    for id in [pending.id, in_flight.id, failed.id] {
        backdate_task(&f.database, id, 400, 400).await;
    }

    let removed = QueuePurger::new(f.dal.clone())
        .purge_tasks()
        .await
        .expect("purge");

    assert_eq!(removed, 0);
    for id in [pending.id, in_flight.id, failed.id] {
        f.dal
            .tasks()
            .get_by_id(id)
            .await
            .expect("record must survive the purge");
    }
}

#[tokio::test]
async fn test_old_successful_records_are_removed() {
    let f = fixture().await;

    let old = seed_success(&f, 1).await;
    let recent = seed_success(&f, 2).await;
    backdate_task(&f.database, old, 40, 40).await;

    let removed = QueuePurger::new(f.dal.clone())
        .purge_tasks()
        .await
        .expect("purge");

    assert_eq!(removed, 1);
    assert!(f.dal.tasks().get_by_id(old).await.is_err());
    assert!(f.dal.tasks().get_by_id(recent).await.is_ok());
}

#[tokio::test]
async fn test_overflow_keeps_only_newest_successes() {
    let f = fixture().await;
    let policy = RetentionPolicy {
        cap: 5,
        ..Default::default()
    };

    // 8 recent successes plus 2 pending rows: the table is over the cap.
    let mut success_ids = Vec::new();
    for subject in 1..=8 {
        success_ids.push(seed_success(&f, subject).await);
    }
    let scheduler = TaskScheduler::new(f.dal.clone());
    for subject in 100..=101 {
        scheduler
            .schedule_task("order-export", subject, json!({}), false)
            .await
            .expect("schedule");
    }

    let removed = QueuePurger::with_policy(f.dal.clone(), policy)
        .purge_tasks()
        .await
        .expect("purge");

    // The 3 oldest successes go; the newest 5 and all pending rows stay.
    assert_eq!(removed, 3);
    for id in &success_ids[..3] {
        assert!(f.dal.tasks().get_by_id(*id).await.is_err());
    }
    for id in &success_ids[3..] {
        assert!(f.dal.tasks().get_by_id(*id).await.is_ok());
    }

    let pending = f
        .dal
        .tasks()
        .count(TaskFilter {
            status: Some(TaskStatus::New),
            ..Default::default()
        })
        .await
        .expect("count");
    assert_eq!(pending, 2);
}

#[tokio::test]
async fn test_overflow_also_applies_the_seven_day_rule() {
    let f = fixture().await;
    let policy = RetentionPolicy {
        cap: 3,
        ..Default::default()
    };

    // 5 successes; all within the newest-3 window would survive on count
    // alone, but one of the newest is older than 7 days.
    let mut ids = Vec::new();
    for subject in 1..=5 {
        ids.push(seed_success(&f, subject).await);
    }
    backdate_task(&f.database, ids[4], 10, 10).await;

    let removed = QueuePurger::with_policy(f.dal.clone(), policy)
        .purge_tasks()
        .await
        .expect("purge");

    // ids[0], ids[1] fall outside the newest-3 cap; ids[4] trips the 7-day
    // rule even though it is among the newest by id.
    assert_eq!(removed, 3);
    assert!(f.dal.tasks().get_by_id(ids[4]).await.is_err());
    assert!(f.dal.tasks().get_by_id(ids[2]).await.is_ok());
    assert!(f.dal.tasks().get_by_id(ids[3]).await.is_ok());
}

#[tokio::test]
async fn test_purge_under_cap_applies_only_the_age_tier() {
    let f = fixture().await;
    let policy = RetentionPolicy {
        cap: 100,
        ..Default::default()
    };

    let kept = seed_success(&f, 1).await;
    // 10 days old: older than the 7-day overflow rule, but the table is
    // under the cap so only the 30-day tier applies.
    let aging = seed_success(&f, 2).await;
    backdate_task(&f.database, aging, 10, 10).await;

    let removed = QueuePurger::with_policy(f.dal.clone(), policy)
        .purge_tasks()
        .await
        .expect("purge");

    assert_eq!(removed, 0);
    assert!(f.dal.tasks().get_by_id(kept).await.is_ok());
    assert!(f.dal.tasks().get_by_id(aging).await.is_ok());
}

#[tokio::test]
async fn test_webhook_logs_share_the_policy_shape() {
    let f = fixture().await;
    let policy = RetentionPolicy {
        cap: 3,
        ..Default::default()
    };

    let mut ids = Vec::new();
    for i in 0..5 {
        let log = f
            .dal
            .webhook_logs()
            .create(NewWebhookLog {
                route: "/webhooks/events".to_string(),
                method: "POST".to_string(),
                action: format!("event-{}", i),
                body: String::new(),
                headers: None,
                response_code: 200,
            })
            .await
            .expect("create log");
        ids.push(log.id);
    }
    backdate_webhook_log(&f.database, ids[0], 40).await;

    let removed = QueuePurger::with_policy(f.dal.clone(), policy)
        .purge_webhook_logs()
        .await
        .expect("purge");

    // The 40-day-old row goes in tier 1; tier 2 trims down to the newest 3.
    assert_eq!(removed, 2);
    let remaining = f
        .dal
        .webhook_logs()
        .count(Default::default())
        .await
        .expect("count");
    assert_eq!(remaining, 3);
    assert!(f.dal.webhook_logs().get_by_id(ids[0]).await.is_err());
    assert!(f.dal.webhook_logs().get_by_id(ids[4]).await.is_ok());
}

#[tokio::test]
async fn test_purge_all_reports_per_store_counts() {
    let f = fixture().await;

    let old_task = seed_success(&f, 1).await;
    backdate_task(&f.database, old_task, 40, 40).await;

    let log = f
        .dal
        .webhook_logs()
        .create(NewWebhookLog {
            route: "/webhooks/events".to_string(),
            method: "POST".to_string(),
            action: "stale".to_string(),
            body: String::new(),
            headers: None,
            response_code: 200,
        })
        .await
        .expect("create log");
    backdate_webhook_log(&f.database, log.id, 40).await;

    let report = QueuePurger::new(f.dal.clone())
        .purge_all()
        .await
        .expect("purge");

    assert_eq!(report.tasks_removed, 1);
    assert_eq!(report.webhook_logs_removed, 1);
    assert_eq!(report.total(), 2);
}
