//! Engine services: the application-level orchestration over the domain
//! crates and the repositories.
//!
//! Each service follows the same pipeline:
//!
//! ```text
//! load (repositories) -> decide (pure domain code) -> conditional write
//!   -> on a lost race: reload and decide again (bounded)
//!   -> publish audit record (best effort)
//! ```

pub mod daily_stock;
pub mod inventory;
pub mod ledger_sync;
pub mod procurement;
pub mod transfer;

use std::sync::Arc;

use tracing::debug;

use siteledger_core::DomainError;

use crate::audit::AuditTrail;
use crate::error::{RepositoryError, ServiceError, ServiceResult};
use crate::repository::{
    DailyReportRepository, GoodsReceiptRepository, InMemoryDailyReportRepository,
    InMemoryGoodsReceiptRepository, InMemoryInventoryRepository, InMemoryPurchaseOrderRepository,
    InventoryRepository, PurchaseOrderRepository,
};
use crate::sequence::{DocumentSequence, InMemoryDocumentSequence};

pub use daily_stock::{DailyReportOutcome, DailyStockService, DeductionOutcome, DeductionResult};
pub use inventory::{InventoryDashboard, InventoryService};
pub use ledger_sync::{LineSyncOutcome, SyncResult};
pub use procurement::{
    ProcurementService, PurchaseOrderDetail, ReceiptDetail, ReceiptDetailLine, ReceiptOutcome,
    ReceiptSummary,
};
pub use transfer::TransferService;

/// Default number of attempts for a conditional write.
pub const DEFAULT_CAS_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts per mutation before a lost race is reported as a conflict.
    pub cas_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cas_retries: DEFAULT_CAS_RETRIES,
        }
    }
}

/// The repositories the engine runs against.
#[derive(Clone)]
pub struct Stores {
    pub inventory: Arc<dyn InventoryRepository>,
    pub orders: Arc<dyn PurchaseOrderRepository>,
    pub receipts: Arc<dyn GoodsReceiptRepository>,
    pub reports: Arc<dyn DailyReportRepository>,
    pub sequence: Arc<dyn DocumentSequence>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let orders = Arc::new(InMemoryPurchaseOrderRepository::new());
        Self {
            inventory: Arc::new(InMemoryInventoryRepository::new()),
            receipts: Arc::new(InMemoryGoodsReceiptRepository::new(orders.clone())),
            orders,
            reports: Arc::new(InMemoryDailyReportRepository::new()),
            sequence: Arc::new(InMemoryDocumentSequence::new()),
        }
    }
}

pub(crate) struct EngineContext {
    pub(crate) stores: Stores,
    pub(crate) audit: AuditTrail,
    pub(crate) config: EngineConfig,
}

/// All engine services over one set of stores.
#[derive(Clone)]
pub struct Engine {
    pub inventory: InventoryService,
    pub transfers: TransferService,
    pub procurement: ProcurementService,
    pub daily_reports: DailyStockService,
}

impl Engine {
    pub fn new(stores: Stores, audit: AuditTrail, config: EngineConfig) -> Self {
        let ctx = Arc::new(EngineContext {
            stores,
            audit,
            config: EngineConfig {
                cas_retries: config.cas_retries.max(1),
            },
        });
        Self {
            inventory: InventoryService::new(ctx.clone()),
            transfers: TransferService::new(ctx.clone()),
            procurement: ProcurementService::new(ctx.clone()),
            daily_reports: DailyStockService::new(ctx),
        }
    }

    /// In-memory stores, audit disabled.
    pub fn in_memory() -> Self {
        Self::new(Stores::in_memory(), AuditTrail::disabled(), EngineConfig::default())
    }
}

/// Failure of one attempt inside [`retry_on_conflict`].
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// Lost a race; reload and try again.
    Stale(RepositoryError),
    Fatal(ServiceError),
}

impl From<DomainError> for AttemptError {
    fn from(value: DomainError) -> Self {
        AttemptError::Fatal(ServiceError::Domain(value))
    }
}

impl From<RepositoryError> for AttemptError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(_) => AttemptError::Stale(value),
            other => AttemptError::Fatal(other.into()),
        }
    }
}

impl From<ServiceError> for AttemptError {
    fn from(value: ServiceError) -> Self {
        AttemptError::Fatal(value)
    }
}

/// Run `attempt` until it succeeds, fails for a reason other than a lost
/// race, or `max_attempts` is used up.
pub(crate) fn retry_on_conflict<T>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: impl FnMut() -> Result<T, AttemptError>,
) -> ServiceResult<T> {
    let mut last = None;
    for n in 1..=max_attempts {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Stale(err)) => {
                debug!(operation, attempt = n, error = %err, "concurrent update, retrying");
                last = Some(err);
            }
        }
    }
    Err(ServiceError::Domain(DomainError::conflict(format!(
        "{operation}: gave up after {max_attempts} attempts ({})",
        last.map(|e| e.to_string()).unwrap_or_default()
    ))))
}
