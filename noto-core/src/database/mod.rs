//! Database module
//!
//! This module provides all database functionality including:
//! - Schema and migrations
//! - Model definitions
//! - Row-level statements shared by repositories and the import engine
//! - The entity store with live query subscriptions

pub mod models;
pub mod rows;
pub mod schema;
pub mod store;
pub mod subscription;

pub use models::*;
pub use schema::initialize_database;
pub use store::{EntityStore, Table, TableSet, WriteTxn};
pub use subscription::Subscription;

use crate::config::{BUSY_TIMEOUT_SECS, POOL_MAX_CONNECTIONS};
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(url: &str) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(url).map(|opts| {
        opts.create_if_missing(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
    })
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// is opened against the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(&url)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .connect_with(connect_options(&url)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Create an initialized pool over a private in-memory database.
///
/// An in-memory database lives exactly as long as its connection, so the
/// pool holds a single connection that is never recycled.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options("sqlite::memory:")?)
        .await?;

    initialize_database(&pool).await?;

    Ok(pool)
}
