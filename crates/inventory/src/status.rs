//! Stock status classifier.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use siteledger_core::DomainError;

/// Availability of a stock line relative to its reorder threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Classify a quantity against its minimum.
    ///
    /// `low_stock` only applies when a positive threshold is configured.
    pub fn classify(quantity: f64, minimum_quantity: f64) -> Self {
        if quantity <= 0.0 {
            StockStatus::OutOfStock
        } else if minimum_quantity > 0.0 && quantity <= minimum_quantity {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(StockStatus::InStock),
            "low_stock" => Ok(StockStatus::LowStock),
            "out_of_stock" => Ok(StockStatus::OutOfStock),
            other => Err(DomainError::validation(format!(
                "status must be one of: in_stock, low_stock, out_of_stock (got '{other}')"
            ))),
        }
    }
}
