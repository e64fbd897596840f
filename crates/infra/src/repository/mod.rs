//! Repository interfaces, one per document type, plus in-memory backends.
//!
//! Every mutating write is conditional (version or stream length), so the
//! engine services can detect a concurrent writer and retry against fresh
//! state instead of overwriting it.

pub mod daily_report;
pub mod inventory;
pub mod purchasing;

pub use daily_report::{DailyReportRepository, InMemoryDailyReportRepository};
pub use inventory::{InMemoryInventoryRepository, InventoryFilter, InventoryRepository, ItemChange};
pub use purchasing::{
    GoodsReceiptRepository, InMemoryGoodsReceiptRepository, InMemoryPurchaseOrderRepository,
    PurchaseOrderFilter, PurchaseOrderRepository,
};
