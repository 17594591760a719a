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

//! # Storesync
//!
//! A durable task queue and synchronization-processing engine for keeping a
//! local commerce store and a remote backoffice in sync over an unreliable
//! network. Work arrives from two converging channels (inbound webhook
//! events and bulk sync commands), and both tolerate partial failure,
//! re-delivery, and out-of-order arrival without corrupting local state or
//! double-applying effects.
//!
//! The engine provides at-least-once, idempotent-by-construction processing:
//!
//! - [`TaskScheduler`]: the producer API; owns deduplication by name, so a
//!   burst of events for the same remote entity merges into one pending task
//! - [`TaskDrainer`]: the worker loop; claims pending tasks in creation
//!   order, dispatches through an [`ExecutorRegistry`], captures failures as
//!   structured error records, and honors a per-run time budget
//! - [`QueuePurger`]: the 30-day / 1,000-row / 7-day retention policy over
//!   both the task store and the webhook audit log
//! - [`RateAccounting`]: read-only incoming/processed throughput queries
//!
//! Producers, drainers, and the purge command may run as separate concurrent
//! invocations against the shared store; every mutation is a single atomic
//! statement, and the `new -> processing` transition is a guarded
//! compare-and-set.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use storesync::{
//!     Database, DrainConfig, ExecutorRegistry, TaskDrainer, TaskScheduler, DAL,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let database = Database::new("storesync.db");
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//!
//! let mut registry = ExecutorRegistry::new();
//! registry.register_fn("product-import", |payload| async move {
//!     // push `payload` to the local store here
//!     Ok(())
//! });
//!
//! let scheduler = TaskScheduler::new(dal.clone());
//! scheduler
//!     .schedule_task("product-import", 4821, json!({"sku": "X-100"}), false)
//!     .await?;
//!
//! let drainer = TaskDrainer::new(dal, Arc::new(registry), DrainConfig::default());
//! let report = drainer.drain().await?;
//! println!("drained: {:?}", report);
//! # Ok(())
//! # }
//! ```

pub mod dal;
pub mod database;
pub mod drainer;
pub mod error;
pub mod executor;
pub mod models;
pub mod purge;
pub mod rates;
pub mod scheduler;

pub use dal::{TaskFilter, TaskOrder, WebhookLogFilter, WebhookLogOrder, DAL};
pub use database::Database;
pub use drainer::{DrainConfig, DrainReport, TaskDrainer};
pub use error::{DrainError, ExecutorError, QueueError, StorageError, ValidationError};
pub use executor::{ExecutorRegistry, TaskExecutor};
pub use models::task::{ErrorRecord, NewTask, Task, TaskMeta, TaskStatus, UpdateTask};
pub use models::webhook_log::{NewWebhookLog, WebhookLog};
pub use purge::{PurgeReport, QueuePurger, RetentionPolicy};
pub use rates::{RateAccounting, RateSnapshot};
pub use scheduler::TaskScheduler;

/// Initializes tracing for binaries and tests.
///
/// `filter` overrides the default; otherwise `RUST_LOG` is honored, falling
/// back to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
