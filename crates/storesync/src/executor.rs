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

//! # Executor Registry
//!
//! Maps a task's `task_type` string to the code that performs the work.
//! Importers, exporters, and webhook handlers implement [`TaskExecutor`] and
//! register themselves at startup; the drainer resolves each claimed task
//! through the registry at dispatch time.
//!
//! The registry is an explicit instance passed into the drainer, not a
//! process-wide singleton, so resolution failure is a first-class, testable
//! condition rather than an uncaught dynamic-call error.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ExecutorError;
use crate::models::task::Task;

/// One registered unit of synchronization logic.
///
/// Executors receive the claimed task row and its opaque payload, and report
/// failure as a value; the drainer maps an `Err` deterministically into the
/// error record stored on the task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, payload: &Value) -> Result<(), ExecutorError>;
}

type BoxedExecFuture = Pin<Box<dyn Future<Output = Result<(), ExecutorError>> + Send>>;

/// Adapter turning a plain async closure into a [`TaskExecutor`].
struct FnExecutor<F> {
    f: F,
}

#[async_trait]
impl<F> TaskExecutor for FnExecutor<F>
where
    F: Fn(Value) -> BoxedExecFuture + Send + Sync,
{
    async fn execute(&self, _task: &Task, payload: &Value) -> Result<(), ExecutorError> {
        (self.f)(payload.clone()).await
    }
}

/// Registry of available task executors, keyed by task type.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor for a task type. A later registration for the
    /// same type replaces the earlier one.
    pub fn register(&mut self, task_type: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        let task_type = task_type.into();
        tracing::debug!(%task_type, "Registered task executor");
        self.executors.insert(task_type, executor);
    }

    /// Convenience wrapper registering an async closure over the payload.
    pub fn register_fn<F, Fut>(&mut self, task_type: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ExecutorError>> + Send + 'static,
    {
        let boxed = move |payload: Value| -> BoxedExecFuture { Box::pin(f(payload)) };
        self.register(task_type, Arc::new(FnExecutor { f: boxed }));
    }

    /// Resolves a task type to its executor.
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(task_type).cloned()
    }

    /// Checks whether an executor is registered for the task type.
    pub fn contains(&self, task_type: &str) -> bool {
        self.executors.contains_key(task_type)
    }

    /// Returns all registered task types.
    pub fn types(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }

    /// Number of registered executors.
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
