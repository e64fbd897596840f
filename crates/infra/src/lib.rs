//! Infrastructure layer: repositories (in-memory and Postgres), document
//! sequences, audit dispatch and the engine services that orchestrate the
//! domain crates over them.

pub mod audit;
pub mod error;
pub mod postgres;
pub mod repository;
pub mod sequence;
pub mod services;

pub use audit::{AuditRecord, AuditSink, AuditTrail, AuditWorker, WorkerHandle};
pub use error::{RepositoryError, ServiceError, ServiceResult};
pub use postgres::{PgExecutor, PostgresConfig};
pub use services::{Engine, EngineConfig, Stores};
