//! Postgres-backed repositories and document sequence.
//!
//! Documents are stored whole as JSONB next to the columns the queries filter
//! on. The concurrency guards of the in-memory stores are enforced by the
//! database:
//!
//! | Guard | SQL |
//! |-------|-----|
//! | item / order compare-and-swap | `UPDATE ... WHERE id = $1 AND version = $2` |
//! | item batch | one transaction per `InventoryRepository::commit` |
//! | receipt stream length | `FOR SHARE` on the order row + unique `(po_id, seq)` |
//! | stock chain | primary key `(project_id, inventory_id, report_date)` |
//! | document numbers | `INSERT ... ON CONFLICT DO UPDATE ... RETURNING` counter row |
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | RepositoryError |
//! |------------|-----------------|-----------------|
//! | Database (unique violation) | `23505` | `Duplicate` (or `Conflict` where the key is a stream position) |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | any | `Unavailable` |
//! | PoolClosed, Io, Tls, timeouts | N/A | `Unavailable` |
//!
//! The repository traits are synchronous, so every call is driven to
//! completion through [`PgExecutor`].

mod daily_report;
mod inventory;
mod purchasing;
mod sequence;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

use siteledger_core::ExpectedVersion;

use crate::error::RepositoryError;
use crate::services::Stores;

pub use daily_report::PostgresDailyReportRepository;
pub use inventory::PostgresInventoryRepository;
pub use purchasing::{PostgresGoodsReceiptRepository, PostgresPurchaseOrderRepository};
pub use sequence::PostgresDocumentSequence;

/// Connection settings for the Postgres stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a pool and bring the schema up to date.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, RepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| RepositoryError::Unavailable(format!("migration failed: {e}")))?;

    info!(max_connections = config.max_connections, "postgres stores ready");
    Ok(pool)
}

/// Runs sqlx futures for the synchronous repository traits.
///
/// Inside a runtime the call parks the worker with `block_in_place`, which
/// needs the multi-threaded scheduler. Outside one it blocks on the handle the
/// pool was opened on.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
    handle: Handle,
}

impl PgExecutor {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn run<T, F>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err(RepositoryError::Unavailable(
                    "postgres stores need a multi-threaded tokio runtime".to_string(),
                ))
            }
            Ok(current) => tokio::task::block_in_place(|| current.block_on(fut)),
            Err(_) => self.handle.block_on(fut),
        }
    }
}

impl Stores {
    /// Every store backed by the same pool.
    pub fn postgres(executor: PgExecutor) -> Self {
        Self {
            inventory: Arc::new(PostgresInventoryRepository::new(executor.clone())),
            orders: Arc::new(PostgresPurchaseOrderRepository::new(executor.clone())),
            receipts: Arc::new(PostgresGoodsReceiptRepository::new(executor.clone())),
            reports: Arc::new(PostgresDailyReportRepository::new(executor.clone())),
            sequence: Arc::new(PostgresDocumentSequence::new(executor)),
        }
    }
}

/// `version = $n` parameter for a conditional write; `None` skips the check.
/// `NoStream` binds 0, which no stored row carries.
pub(crate) fn version_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::NoStream => Some(0),
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Duplicate(msg),
                Some("23503") => RepositoryError::NotFound(msg),
                _ => RepositoryError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("{operation}: row not found")),
        other => RepositoryError::Unavailable(format!("{operation}: {other}")),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

pub(crate) fn decode_error(operation: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{operation}: undecodable stored document: {err}"))
}
