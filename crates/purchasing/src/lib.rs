//! Purchasing domain module (Purchase Orders and Goods Receipts).
//!
//! This crate contains business rules for purchase orders, goods receipts and
//! the PO/GRN matcher, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod events;
pub mod matcher;
pub mod numbering;
pub mod order;
pub mod receipt;

pub use events::{
    GoodsReceiptAccepted, ProcurementEvent, PurchaseOrderIssued, PurchaseOrderStatusChanged,
};
pub use matcher::{AcceptedLine, LineMatch, LineMatchStatus, ReceivedTotals, line_summaries};
pub use numbering::{DocumentKind, DocumentPeriod, format_document_number};
pub use order::{
    NewPurchaseOrder, PoLineItem, PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus,
};
pub use receipt::{GoodsReceipt, GoodsReceiptId, ReceiptLine, ReceiptStatus, ReceiptSubmission};
