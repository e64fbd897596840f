use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::quantity::{ensure_non_negative, ensure_positive};
use siteledger_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, ProjectId, UserId, VendorId,
};

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// `pending -> approved -> delivered -> closed`, with cancellation allowed
/// while the order is still pending or approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Pending,
    Approved,
    Delivered,
    Closed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Delivered => "delivered",
            PurchaseOrderStatus::Closed => "closed",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Approved, Delivered)
                | (Delivered, Closed)
                | (Pending, Cancelled)
                | (Approved, Cancelled)
        )
    }

    /// Cancelled and closed orders take no further receipts.
    pub fn accepts_receipts(self) -> bool {
        !matches!(
            self,
            PurchaseOrderStatus::Cancelled | PurchaseOrderStatus::Closed
        )
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PurchaseOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PurchaseOrderStatus::Pending),
            "approved" => Ok(PurchaseOrderStatus::Approved),
            "delivered" => Ok(PurchaseOrderStatus::Delivered),
            "closed" => Ok(PurchaseOrderStatus::Closed),
            "cancelled" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown purchase order status '{other}'"
            ))),
        }
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoLineItem {
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    #[serde(default)]
    pub rate: f64,
    #[serde(default = "default_gst_rate")]
    pub gst_rate: f64,
}

fn default_gst_rate() -> f64 {
    18.0
}

impl PoLineItem {
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }

    pub fn gst_amount(&self) -> f64 {
        self.amount() * self.gst_rate / 100.0
    }

    fn validate(&self, index: usize) -> DomainResult<()> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "line {index}: description cannot be empty"
            )));
        }
        ensure_positive(self.quantity, "quantity")?;
        ensure_non_negative(self.rate, "rate")?;
        ensure_non_negative(self.gst_rate, "gst_rate")?;
        Ok(())
    }
}

/// Input for issuing a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub project_id: ProjectId,
    pub vendor_id: VendorId,
    pub po_date: NaiveDate,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    pub items: Vec<PoLineItem>,
    #[serde(default)]
    pub terms: Option<String>,
}

impl NewPurchaseOrder {
    /// Non-empty lines, each valid, and no delivery before the order date.
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "purchase order must have at least one line",
            ));
        }
        for (index, line) in self.items.iter().enumerate() {
            line.validate(index)?;
        }
        if let Some(delivery) = self.delivery_date {
            if delivery < self.po_date {
                return Err(DomainError::validation(
                    "delivery_date cannot be before po_date",
                ));
            }
        }
        Ok(())
    }
}

/// Aggregate root: PurchaseOrder.
///
/// The line list is fixed once issued; only the status moves afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    po_number: String,
    project_id: ProjectId,
    vendor_id: VendorId,
    po_date: NaiveDate,
    delivery_date: Option<NaiveDate>,
    items: Vec<PoLineItem>,
    terms: Option<String>,
    subtotal: f64,
    gst_amount: f64,
    total: f64,
    status: PurchaseOrderStatus,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

impl PurchaseOrder {
    /// Validate the lines, compute totals and create a pending order.
    pub fn issue(
        id: PurchaseOrderId,
        po_number: String,
        input: NewPurchaseOrder,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;

        let subtotal: f64 = input.items.iter().map(PoLineItem::amount).sum();
        let gst_amount: f64 = input.items.iter().map(PoLineItem::gst_amount).sum();

        Ok(Self {
            id,
            po_number,
            project_id: input.project_id,
            vendor_id: input.vendor_id,
            po_date: input.po_date,
            delivery_date: input.delivery_date,
            items: input.items,
            terms: input.terms,
            subtotal,
            gst_amount,
            total: subtotal + gst_amount,
            status: PurchaseOrderStatus::Pending,
            created_by,
            created_at: now,
            updated_at: None,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn po_date(&self) -> NaiveDate {
        self.po_date
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn items(&self) -> &[PoLineItem] {
        &self.items
    }

    pub fn terms(&self) -> Option<&str> {
        self.terms.as_deref()
    }

    pub fn subtotal(&self) -> f64 {
        self.subtotal
    }

    pub fn gst_amount(&self) -> f64 {
        self.gst_amount
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Resolve a line by positional index.
    pub fn line(&self, index: usize) -> DomainResult<&PoLineItem> {
        self.items.get(index).ok_or(DomainError::InvalidReference {
            index,
            line_count: self.items.len(),
        })
    }

    pub fn ensure_accepts_receipts(&self) -> DomainResult<()> {
        if !self.status.accepts_receipts() {
            return Err(DomainError::validation(format!(
                "purchase order {} is {} and cannot receive goods",
                self.po_number, self.status
            )));
        }
        Ok(())
    }

    /// Move to `next`, enforcing the lifecycle.
    pub fn transition(&mut self, next: PurchaseOrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::validation(format!(
                "cannot move purchase order from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Some(now);
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
