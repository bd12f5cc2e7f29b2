//! Test helpers and utilities for unit and integration testing.
//!
//! Provides in-memory database setup and fixtures shared by the wizard and
//! API tests.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Executor;

use crate::db::{Application, DbPool};
use crate::services::probes::ProbeSet;
use crate::state::AppState;

/// Create an in-memory SQLite pool for testing.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn create_test_pool() -> DbPool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Valid test database URL")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test database");

    pool.execute(crate::db::pool::SCHEMA_SQL)
        .await
        .expect("Failed to run test migrations");

    pool
}

/// Wrap a pool into the shared application state used by the handlers.
pub fn create_test_state(pool: DbPool) -> AppState {
    AppState::new(pool, Arc::new(ProbeSet::new()))
}

/// Register a test application and return it.
pub async fn create_test_app(pool: &DbPool, name: &str) -> Application {
    let now = chrono::Utc::now();

    sqlx::query_as(
        "INSERT INTO applications (name, repository_url, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         RETURNING *",
    )
    .bind(name)
    .bind("https://github.com/example/repo")
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .expect("Failed to create test application")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_pool() {
        let pool = create_test_pool().await;
        let (one,): (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_create_test_app() {
        let pool = create_test_pool().await;
        let app = create_test_app(&pool, "billing").await;

        assert_eq!(app.name, "billing");
        assert!(app.repository_url.is_some());
        assert!(app.sonar_project_key.is_none());
    }
}
