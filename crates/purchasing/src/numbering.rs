//! Human-readable document numbers: `<PREFIX>-<YYYYMM>-<NNNN>`.
//!
//! The sequence value itself comes from an atomic counter in the store layer;
//! this module only owns the format.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    PurchaseOrder,
    GoodsReceipt,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::GoodsReceipt => "GRN",
        }
    }
}

/// Calendar month a sequence is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPeriod {
    pub year: i32,
    pub month: u32,
}

impl DocumentPeriod {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

pub fn format_document_number(kind: DocumentKind, period: DocumentPeriod, sequence: u64) -> String {
    format!(
        "{}-{:04}{:02}-{:04}",
        kind.prefix(),
        period.year,
        period.month,
        sequence
    )
}
