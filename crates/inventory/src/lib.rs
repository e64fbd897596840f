//! Inventory ledger domain module.
//!
//! This crate contains the business rules for per-project stock lines,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage): the stock status classifier, the quantity mutators that keep
//! `total_value` and `status` derived, and inter-project transfers.

pub mod events;
pub mod item;
pub mod status;
pub mod transfer;

pub use events::{
    EquipmentInUse, InventoryEvent, ItemCreated, ItemDeleted, ItemUpdated, QuantityAdjusted,
    StockTransferred,
};
pub use item::{
    ClampedConsumption, DEFAULT_GST_RATE, DEFAULT_UNIT, EquipmentCondition, EquipmentDetails,
    EquipmentStatus, InventoryItem, InventoryItemId, ItemChanges, ItemKind, NewInventoryItem,
    QuantityAdjustment,
};
pub use status::StockStatus;
pub use transfer::{TransferDestination, TransferOutcome, TransferReceipt, TransferRequest};
