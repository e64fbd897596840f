use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use siteledger_core::{AggregateRoot, ExpectedVersion, ProjectId, VendorId};
use siteledger_purchasing::{
    GoodsReceipt, GoodsReceiptId, PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus,
};

use crate::error::RepositoryError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseOrderFilter {
    pub project_id: Option<ProjectId>,
    pub vendor_id: Option<VendorId>,
    pub status: Option<PurchaseOrderStatus>,
}

impl PurchaseOrderFilter {
    pub fn matches(&self, order: &PurchaseOrder) -> bool {
        self.project_id.is_none_or(|p| order.project_id() == p)
            && self.vendor_id.is_none_or(|v| order.vendor_id() == v)
            && self.status.is_none_or(|s| order.status() == s)
    }
}

pub trait PurchaseOrderRepository: Send + Sync {
    fn get(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, RepositoryError>;

    fn list(&self, filter: &PurchaseOrderFilter) -> Result<Vec<PurchaseOrder>, RepositoryError>;

    fn insert(&self, order: PurchaseOrder) -> Result<(), RepositoryError>;

    /// Replace a stored order, compare-and-swap on its version.
    fn save(&self, order: PurchaseOrder, expected: ExpectedVersion) -> Result<(), RepositoryError>;
}

impl<R> PurchaseOrderRepository for Arc<R>
where
    R: PurchaseOrderRepository + ?Sized,
{
    fn get(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, RepositoryError> {
        (**self).get(id)
    }

    fn list(&self, filter: &PurchaseOrderFilter) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        (**self).list(filter)
    }

    fn insert(&self, order: PurchaseOrder) -> Result<(), RepositoryError> {
        (**self).insert(order)
    }

    fn save(&self, order: PurchaseOrder, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).save(order, expected)
    }
}

/// Append-only goods receipts, one stream per purchase order.
///
/// A stream's version is its length. `append` takes the stream version and the
/// order version the caller validated against; if another receipt landed or
/// the order changed in between, the append is refused and the caller must
/// re-read and re-check.
pub trait GoodsReceiptRepository: Send + Sync {
    fn get(&self, id: GoodsReceiptId) -> Result<Option<GoodsReceipt>, RepositoryError>;

    /// All receipts for the order, oldest first.
    fn load_for_order(&self, po_id: PurchaseOrderId) -> Result<Vec<GoodsReceipt>, RepositoryError>;

    fn list(&self, po_id: Option<PurchaseOrderId>) -> Result<Vec<GoodsReceipt>, RepositoryError>;

    fn append(
        &self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
        order_version: u64,
    ) -> Result<(), RepositoryError>;
}

impl<R> GoodsReceiptRepository for Arc<R>
where
    R: GoodsReceiptRepository + ?Sized,
{
    fn get(&self, id: GoodsReceiptId) -> Result<Option<GoodsReceipt>, RepositoryError> {
        (**self).get(id)
    }

    fn load_for_order(&self, po_id: PurchaseOrderId) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        (**self).load_for_order(po_id)
    }

    fn list(&self, po_id: Option<PurchaseOrderId>) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        (**self).list(po_id)
    }

    fn append(
        &self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
        order_version: u64,
    ) -> Result<(), RepositoryError> {
        (**self).append(receipt, expected, order_version)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPurchaseOrderRepository {
    orders: RwLock<HashMap<PurchaseOrderId, PurchaseOrder>>,
}

impl InMemoryPurchaseOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PurchaseOrderRepository for InMemoryPurchaseOrderRepository {
    fn get(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, RepositoryError> {
        let map = self.orders.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn list(&self, filter: &PurchaseOrderFilter) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        let map = self.orders.read().map_err(|_| RepositoryError::poisoned())?;
        let mut orders: Vec<PurchaseOrder> =
            map.values().filter(|o| filter.matches(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    fn insert(&self, order: PurchaseOrder) -> Result<(), RepositoryError> {
        let mut map = self.orders.write().map_err(|_| RepositoryError::poisoned())?;
        if map.contains_key(&order.id_typed()) {
            return Err(RepositoryError::Duplicate(format!(
                "purchase order {}",
                order.id_typed()
            )));
        }
        if map.values().any(|o| o.po_number() == order.po_number()) {
            return Err(RepositoryError::Duplicate(format!(
                "po_number {}",
                order.po_number()
            )));
        }
        map.insert(order.id_typed(), order);
        Ok(())
    }

    fn save(&self, order: PurchaseOrder, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut map = self.orders.write().map_err(|_| RepositoryError::poisoned())?;
        let current = match map.get(&order.id_typed()) {
            Some(o) => o.version(),
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "purchase order {}",
                    order.id_typed()
                )));
            }
        };
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "purchase order {}: expected {expected:?}, found {current}",
                order.id_typed()
            )));
        }
        map.insert(order.id_typed(), order);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ReceiptStreams {
    by_order: HashMap<PurchaseOrderId, Vec<GoodsReceipt>>,
    index: HashMap<GoodsReceiptId, PurchaseOrderId>,
}

/// In-memory receipt streams, fenced against the orders they belong to.
#[derive(Debug)]
pub struct InMemoryGoodsReceiptRepository {
    inner: RwLock<ReceiptStreams>,
    orders: Arc<InMemoryPurchaseOrderRepository>,
}

impl InMemoryGoodsReceiptRepository {
    pub fn new(orders: Arc<InMemoryPurchaseOrderRepository>) -> Self {
        Self {
            inner: RwLock::new(ReceiptStreams::default()),
            orders,
        }
    }
}

impl GoodsReceiptRepository for InMemoryGoodsReceiptRepository {
    fn get(&self, id: GoodsReceiptId) -> Result<Option<GoodsReceipt>, RepositoryError> {
        let streams = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(streams
            .index
            .get(&id)
            .and_then(|po| streams.by_order.get(po))
            .and_then(|stream| stream.iter().find(|r| r.id == id))
            .cloned())
    }

    fn load_for_order(&self, po_id: PurchaseOrderId) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        let streams = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(streams.by_order.get(&po_id).cloned().unwrap_or_default())
    }

    fn list(&self, po_id: Option<PurchaseOrderId>) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        let streams = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        let mut receipts: Vec<GoodsReceipt> = match po_id {
            Some(po) => streams.by_order.get(&po).cloned().unwrap_or_default(),
            None => streams.by_order.values().flatten().cloned().collect(),
        };
        receipts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(receipts)
    }

    fn append(
        &self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
        order_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut streams = self.inner.write().map_err(|_| RepositoryError::poisoned())?;
        if streams.index.contains_key(&receipt.id) {
            return Err(RepositoryError::Duplicate(format!("goods receipt {}", receipt.id)));
        }

        // Held until the receipt is stored so no order update can slip in.
        let orders = self.orders.orders.read().map_err(|_| RepositoryError::poisoned())?;
        let current_order = match orders.get(&receipt.po_id) {
            Some(order) => order.version(),
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "purchase order {}",
                    receipt.po_id
                )));
            }
        };
        if current_order != order_version {
            return Err(RepositoryError::Conflict(format!(
                "purchase order {}: expected version {order_version}, found {current_order}",
                receipt.po_id
            )));
        }

        let stream = streams.by_order.entry(receipt.po_id).or_default();
        let current = stream.len() as u64;
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "receipts for purchase order {}: expected {expected:?}, found {current}",
                receipt.po_id
            )));
        }

        let (id, po_id) = (receipt.id, receipt.po_id);
        stream.push(receipt);
        streams.index.insert(id, po_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use siteledger_core::AggregateId;
    use siteledger_purchasing::{NewPurchaseOrder, PoLineItem, ReceiptLine, ReceiptSubmission};

    fn order() -> PurchaseOrder {
        PurchaseOrder::issue(
            PurchaseOrderId::new(AggregateId::new()),
            format!("PO-202501-{}", AggregateId::new()),
            NewPurchaseOrder {
                project_id: ProjectId::new(),
                vendor_id: VendorId::new(),
                po_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                delivery_date: None,
                items: vec![PoLineItem {
                    description: "TMT bars".to_string(),
                    unit: "MT".to_string(),
                    quantity: 10.0,
                    rate: 52_000.0,
                    gst_rate: 18.0,
                }],
                terms: None,
            },
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn receipt(po_id: PurchaseOrderId, quantity: f64) -> GoodsReceipt {
        GoodsReceipt::record(
            GoodsReceiptId::new(AggregateId::new()),
            "GRN-202501-0001".to_string(),
            ReceiptSubmission {
                po_id,
                grn_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
                items: vec![ReceiptLine {
                    po_item_index: 0,
                    received_quantity: quantity,
                    remarks: None,
                }],
                notes: None,
            },
            None,
            Utc::now(),
        )
    }

    fn stores() -> (Arc<InMemoryPurchaseOrderRepository>, InMemoryGoodsReceiptRepository) {
        let orders = Arc::new(InMemoryPurchaseOrderRepository::new());
        let receipts = InMemoryGoodsReceiptRepository::new(orders.clone());
        (orders, receipts)
    }

    #[test]
    fn append_requires_expected_stream_version() {
        let (orders, repo) = stores();
        let po = order();
        let po_id = po.id_typed();
        orders.insert(po).unwrap();

        repo.append(receipt(po_id, 1.0), ExpectedVersion::NoStream, 1).unwrap();
        assert!(matches!(
            repo.append(receipt(po_id, 2.0), ExpectedVersion::NoStream, 1),
            Err(RepositoryError::Conflict(_))
        ));
        repo.append(receipt(po_id, 2.0), ExpectedVersion::Exact(1), 1).unwrap();

        let stream = repo.load_for_order(po_id).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[1].items[0].received_quantity, 2.0);
        assert!(repo.get(stream[0].id).unwrap().is_some());
    }

    #[test]
    fn append_is_refused_once_the_order_moved_on() {
        let (orders, repo) = stores();
        let po = order();
        let po_id = po.id_typed();
        orders.insert(po.clone()).unwrap();

        let mut cancelled = po.clone();
        cancelled
            .transition(PurchaseOrderStatus::Cancelled, Utc::now())
            .unwrap();
        orders.save(cancelled, ExpectedVersion::Exact(1)).unwrap();

        // Checked against version 1, but the cancellation committed first.
        assert!(matches!(
            repo.append(receipt(po_id, 1.0), ExpectedVersion::NoStream, 1),
            Err(RepositoryError::Conflict(_))
        ));
        assert!(repo.load_for_order(po_id).unwrap().is_empty());
        assert!(matches!(
            repo.append(
                receipt(PurchaseOrderId::new(AggregateId::new()), 1.0),
                ExpectedVersion::NoStream,
                1
            ),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn streams_are_per_order() {
        let (orders, repo) = stores();
        let (a, b) = (order(), order());
        let (a_id, b_id) = (a.id_typed(), b.id_typed());
        orders.insert(a).unwrap();
        orders.insert(b).unwrap();

        repo.append(receipt(a_id, 1.0), ExpectedVersion::NoStream, 1).unwrap();
        repo.append(receipt(b_id, 1.0), ExpectedVersion::NoStream, 1).unwrap();
        assert_eq!(repo.list(Some(a_id)).unwrap().len(), 1);
        assert_eq!(repo.list(None).unwrap().len(), 2);
    }
}
