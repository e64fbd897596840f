//! PO/GRN matcher.
//!
//! Decides whether a goods receipt submission can be accepted against a
//! purchase order, given every receipt already recorded for that order. The
//! check is all-or-nothing: one bad line rejects the whole submission.

use serde::Serialize;

use siteledger_core::quantity::{ensure_positive, exceeds};
use siteledger_core::{DomainError, DomainResult};

use crate::order::PurchaseOrder;
use crate::receipt::{GoodsReceipt, ReceiptLine};

/// Cumulative received quantity per PO line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceivedTotals {
    per_line: Vec<f64>,
}

/// A validated receipt line with the context it was checked against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedLine {
    pub po_item_index: usize,
    pub received_quantity: f64,
    pub ordered: f64,
    pub already_received: f64,
}

impl ReceivedTotals {
    /// Sum every prior receipt's lines for `order`.
    pub fn from_receipts<'a>(
        order: &PurchaseOrder,
        receipts: impl IntoIterator<Item = &'a GoodsReceipt>,
    ) -> Self {
        let mut totals = Self {
            per_line: vec![0.0; order.items().len()],
        };
        for receipt in receipts {
            totals.record(&receipt.items);
        }
        totals
    }

    pub fn received(&self, index: usize) -> f64 {
        self.per_line.get(index).copied().unwrap_or(0.0)
    }

    /// Validate `lines` against `order` and the history held here.
    ///
    /// Checks run per line in submission order (index, then quantity); the
    /// over-receipt check then runs per PO line on the combined quantity of
    /// every submission line that references it.
    pub fn check(&self, order: &PurchaseOrder, lines: &[ReceiptLine]) -> DomainResult<Vec<AcceptedLine>> {
        order.ensure_accepts_receipts()?;
        if lines.is_empty() {
            return Err(DomainError::validation("goods receipt must have at least one line"));
        }

        let mut requested = vec![0.0; order.items().len()];
        for line in lines {
            order.line(line.po_item_index)?;
            ensure_positive(line.received_quantity, "received_quantity")?;
            requested[line.po_item_index] += line.received_quantity;
        }

        for (index, &quantity) in requested.iter().enumerate() {
            if quantity <= 0.0 {
                continue;
            }
            let po_line = order.line(index)?;
            let already_received = self.received(index);
            if exceeds(already_received + quantity, po_line.quantity) {
                return Err(DomainError::OverReceipt {
                    line_index: index,
                    description: po_line.description.clone(),
                    requested: quantity,
                    ordered: po_line.quantity,
                    already_received,
                    remaining: (po_line.quantity - already_received).max(0.0),
                });
            }
        }

        Ok(lines
            .iter()
            .map(|line| AcceptedLine {
                po_item_index: line.po_item_index,
                received_quantity: line.received_quantity,
                ordered: order.items()[line.po_item_index].quantity,
                already_received: self.received(line.po_item_index),
            })
            .collect())
    }

    /// Fold accepted lines into the totals.
    pub fn record(&mut self, lines: &[ReceiptLine]) {
        for line in lines {
            // Out-of-range history cannot come from an accepted receipt; skip it.
            if let Some(total) = self.per_line.get_mut(line.po_item_index) {
                *total += line.received_quantity;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineMatchStatus {
    Complete,
    Partial,
    Pending,
}

/// Received-vs-ordered view of one PO line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineMatch {
    pub index: usize,
    pub description: String,
    pub unit: String,
    pub ordered: f64,
    pub received: f64,
    pub pending: f64,
    pub status: LineMatchStatus,
}

pub fn line_summaries(order: &PurchaseOrder, totals: &ReceivedTotals) -> Vec<LineMatch> {
    order
        .items()
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let received = totals.received(index);
            let status = if !exceeds(line.quantity, received) {
                LineMatchStatus::Complete
            } else if received > 0.0 {
                LineMatchStatus::Partial
            } else {
                LineMatchStatus::Pending
            };
            LineMatch {
                index,
                description: line.description.clone(),
                unit: line.unit.clone(),
                ordered: line.quantity,
                received,
                pending: (line.quantity - received).max(0.0),
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewPurchaseOrder, PoLineItem, PurchaseOrderId, PurchaseOrderStatus};
    use crate::receipt::{GoodsReceiptId, ReceiptSubmission};
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;
    use siteledger_core::{AggregateId, ProjectId, VendorId};

    fn order_with(quantities: &[f64]) -> PurchaseOrder {
        let items = quantities
            .iter()
            .enumerate()
            .map(|(i, &quantity)| PoLineItem {
                description: format!("Line {i}"),
                unit: "Nos".to_string(),
                quantity,
                rate: 10.0,
                gst_rate: 18.0,
            })
            .collect();
        PurchaseOrder::issue(
            PurchaseOrderId::new(AggregateId::new()),
            "PO-202501-0001".to_string(),
            NewPurchaseOrder {
                project_id: ProjectId::new(),
                vendor_id: VendorId::new(),
                po_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
                delivery_date: None,
                items,
                terms: None,
            },
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn receive(index: usize, quantity: f64) -> Vec<ReceiptLine> {
        vec![ReceiptLine {
            po_item_index: index,
            received_quantity: quantity,
            remarks: None,
        }]
    }

    fn grn(order: &PurchaseOrder, lines: Vec<ReceiptLine>) -> GoodsReceipt {
        GoodsReceipt::record(
            GoodsReceiptId::new(AggregateId::new()),
            "GRN-202501-0001".to_string(),
            ReceiptSubmission {
                po_id: order.id_typed(),
                grn_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                items: lines,
                notes: None,
            },
            None,
            Utc::now(),
        )
    }

    #[test]
    fn partial_receipts_accumulate_until_ordered_quantity() {
        let order = order_with(&[100.0]);
        let mut totals = ReceivedTotals::from_receipts(&order, []);

        totals.check(&order, &receive(0, 60.0)).unwrap();
        totals.record(&receive(0, 60.0));

        match totals.check(&order, &receive(0, 50.0)).unwrap_err() {
            DomainError::OverReceipt {
                ordered,
                already_received,
                remaining,
                ..
            } => {
                assert_eq!(ordered, 100.0);
                assert_eq!(already_received, 60.0);
                assert_eq!(remaining, 40.0);
            }
            other => panic!("expected OverReceipt, got {other:?}"),
        }

        totals.check(&order, &receive(0, 40.0)).unwrap();
        totals.record(&receive(0, 40.0));
        assert_eq!(totals.received(0), 100.0);

        match totals.check(&order, &receive(0, 1.0)).unwrap_err() {
            DomainError::OverReceipt { remaining, .. } => assert_eq!(remaining, 0.0),
            other => panic!("expected OverReceipt, got {other:?}"),
        }
    }

    #[test]
    fn invalid_index_is_rejected() {
        let order = order_with(&[10.0, 5.0]);
        let totals = ReceivedTotals::from_receipts(&order, []);
        assert_eq!(
            totals.check(&order, &receive(2, 1.0)).unwrap_err(),
            DomainError::InvalidReference {
                index: 2,
                line_count: 2
            }
        );
    }

    #[test]
    fn one_bad_line_rejects_the_whole_submission() {
        let order = order_with(&[10.0, 5.0]);
        let totals = ReceivedTotals::from_receipts(&order, []);
        let lines = vec![
            ReceiptLine {
                po_item_index: 0,
                received_quantity: 4.0,
                remarks: None,
            },
            ReceiptLine {
                po_item_index: 1,
                received_quantity: 6.0,
                remarks: None,
            },
        ];
        assert!(matches!(
            totals.check(&order, &lines),
            Err(DomainError::OverReceipt { line_index: 1, .. })
        ));
    }

    #[test]
    fn duplicate_lines_in_one_submission_are_combined() {
        let order = order_with(&[10.0]);
        let totals = ReceivedTotals::from_receipts(&order, []);
        let mut lines = receive(0, 6.0);
        lines.extend(receive(0, 6.0));
        match totals.check(&order, &lines).unwrap_err() {
            DomainError::OverReceipt { requested, .. } => assert_eq!(requested, 12.0),
            other => panic!("expected OverReceipt, got {other:?}"),
        }
    }

    #[test]
    fn zero_quantity_and_empty_submission_are_rejected() {
        let order = order_with(&[10.0]);
        let totals = ReceivedTotals::from_receipts(&order, []);
        assert!(matches!(
            totals.check(&order, &receive(0, 0.0)),
            Err(DomainError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            totals.check(&order, &[]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn closed_order_refuses_receipts() {
        let mut order = order_with(&[10.0]);
        order.transition(PurchaseOrderStatus::Cancelled, Utc::now()).unwrap();
        let totals = ReceivedTotals::from_receipts(&order, []);
        assert!(matches!(
            totals.check(&order, &receive(0, 1.0)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn totals_are_summed_over_full_history() {
        let order = order_with(&[10.0, 20.0]);
        let history = vec![
            grn(&order, receive(0, 3.0)),
            grn(&order, receive(1, 5.0)),
            grn(&order, receive(0, 2.5)),
        ];
        let totals = ReceivedTotals::from_receipts(&order, &history);
        assert_eq!(totals.received(0), 5.5);
        assert_eq!(totals.received(1), 5.0);

        let summary = line_summaries(&order, &totals);
        assert_eq!(summary[0].status, LineMatchStatus::Partial);
        assert_eq!(summary[0].pending, 4.5);

        let full = ReceivedTotals::from_receipts(&order, [&grn(&order, receive(1, 20.0))]);
        let summary = line_summaries(&order, &full);
        assert_eq!(summary[0].status, LineMatchStatus::Pending);
        assert_eq!(summary[1].status, LineMatchStatus::Complete);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever receipts are attempted, accepted ones never sum
        /// past the ordered quantity, and every rejection reports an accurate
        /// remaining quantity.
        #[test]
        fn accepted_receipts_never_exceed_ordered(
            ordered in 1.0f64..1000.0,
            attempts in prop::collection::vec(0.01f64..400.0, 1..40)
        ) {
            let order = order_with(&[ordered]);
            let mut history: Vec<GoodsReceipt> = Vec::new();

            for quantity in attempts {
                let totals = ReceivedTotals::from_receipts(&order, &history);
                match totals.check(&order, &receive(0, quantity)) {
                    Ok(_) => history.push(grn(&order, receive(0, quantity))),
                    Err(DomainError::OverReceipt { remaining, already_received, .. }) => {
                        prop_assert!((remaining - (ordered - already_received).max(0.0)).abs() < 1e-9);
                        prop_assert!(quantity > remaining);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                let after = ReceivedTotals::from_receipts(&order, &history);
                prop_assert!(after.received(0) <= ordered + 1e-9);
            }
        }
    }
}
