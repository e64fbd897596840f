use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::{AggregateId, UserId};

use crate::order::PurchaseOrderId;

/// Goods receipt note identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodsReceiptId(pub AggregateId);

impl GoodsReceiptId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GoodsReceiptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One received line, pointing at a PO line by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub po_item_index: usize,
    pub received_quantity: f64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSubmission {
    pub po_id: PurchaseOrderId,
    pub grn_date: NaiveDate,
    pub items: Vec<ReceiptLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Received,
}

/// An accepted goods receipt. Append-only: never edited once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: GoodsReceiptId,
    pub grn_number: String,
    pub po_id: PurchaseOrderId,
    pub grn_date: NaiveDate,
    pub items: Vec<ReceiptLine>,
    pub notes: Option<String>,
    pub status: ReceiptStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl GoodsReceipt {
    pub fn record(
        id: GoodsReceiptId,
        grn_number: String,
        submission: ReceiptSubmission,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            grn_number,
            po_id: submission.po_id,
            grn_date: submission.grn_date,
            items: submission.items,
            notes: submission.notes,
            status: ReceiptStatus::Received,
            created_by,
            created_at: now,
        }
    }
}
