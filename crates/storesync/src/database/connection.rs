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

//! SQLite connection management.
//!
//! This module provides an async connection pool implementation using
//! `deadpool-diesel` for managing database connections. The queue runs against
//! a single store instance, so SQLite is the backing engine; the pool is a
//! thread-safe handle that producers, drainers, and the purge command all
//! share.
//!
//! # Features
//!
//! - Connection pooling with automatic connection cleanup
//! - File path, `sqlite://` URL, or `:memory:` configuration
//! - Embedded migrations with WAL and busy-timeout pragmas
//!
//! # Example
//!
//! ```rust,no_run
//! use storesync::database::Database;
//!
//! let db = Database::new("path/to/storesync.db");
//! ```

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use tracing::info;

use crate::error::StorageError;

/// A pooled handle to the queue's SQLite database.
///
/// The struct is `Clone` and can be shared freely between components; each
/// clone references the same underlying pool. Every component constructor in
/// this crate takes a handle explicitly rather than reaching for ambient
/// state.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(sqlite)")
    }
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// Accepts a bare file path, a `sqlite://`-prefixed URL, or `:memory:`.
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(connection_url, Runtime::Tokio1);
        // SQLite has limited concurrent write support even with WAL mode.
        // Using a single connection avoids "database is locked" errors.
        let pool_size = 1;
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: {})", pool_size);

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Gets a connection from the pool.
    pub async fn get_connection(
        &self,
    ) -> Result<
        deadpool::managed::Object<Manager>,
        deadpool::managed::PoolError<deadpool_diesel::Error>,
    > {
        self.pool.get().await
    }

    /// Builds a SQLite connection URL.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending database migrations.
    ///
    /// Also applies the pragmas the queue depends on: WAL mode allows
    /// concurrent reads during writes, and `busy_timeout` makes SQLite wait
    /// 30s instead of immediately failing on locks.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        use diesel::prelude::*;
        use diesel_migrations::MigrationHarness;

        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        conn.interact(|conn| {
            diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
            diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;

            conn.run_pending_migrations(crate::database::MIGRATIONS)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            Ok::<_, StorageError>(())
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }
}
