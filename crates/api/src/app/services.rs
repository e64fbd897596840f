//! Engine wiring for the HTTP layer: the stores (Postgres when
//! `DATABASE_URL` is set, in-memory otherwise), the audit bus and its draining
//! worker.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::info;

use siteledger_events::InMemoryEventBus;
use siteledger_infra::postgres;
use siteledger_infra::{
    AuditRecord, AuditTrail, AuditWorker, Engine, EngineConfig, PgExecutor, PostgresConfig, Stores,
    WorkerHandle,
};

use crate::config::AppConfig;

pub struct AppServices {
    engine: Engine,
    audit_bus: Arc<InMemoryEventBus<AuditRecord>>,
    audit_worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Close the audit bus and stop the worker once it has drained what was
    /// queued. Records published afterwards are logged as dropped. Idempotent.
    pub fn shutdown(&self) {
        self.audit_bus.close();
        let handle = match self.audit_worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.shutdown();
            info!("audit worker stopped");
        }
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Postgres stores need the multi-threaded runtime; see [`PgExecutor`].
async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let pg = PostgresConfig {
                max_connections: config.db_max_connections,
                ..PostgresConfig::new(url.clone())
            };
            let pool = postgres::connect(&pg)
                .await
                .context("failed to open the postgres stores")?;
            info!("using postgres stores");
            Ok(Stores::postgres(PgExecutor::new(
                pool,
                tokio::runtime::Handle::current(),
            )))
        }
        None => {
            info!("using in-memory stores");
            Ok(Stores::in_memory())
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let stores = build_stores(config).await?;
    let bus: Arc<InMemoryEventBus<AuditRecord>> = Arc::new(InMemoryEventBus::new());
    let worker = AuditWorker::spawn(&bus).context("failed to spawn audit worker")?;

    let engine = Engine::new(
        stores,
        AuditTrail::new(bus.clone()),
        EngineConfig {
            cas_retries: config.cas_retries,
        },
    );
    info!(cas_retries = config.cas_retries, "engine services ready");

    Ok(AppServices {
        engine,
        audit_bus: bus,
        audit_worker: Mutex::new(Some(worker)),
    })
}
