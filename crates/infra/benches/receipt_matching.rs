use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use siteledger_core::{AggregateId, AggregateRoot, ExpectedVersion, ProjectId, VendorId};
use siteledger_infra::repository::{
    GoodsReceiptRepository, InMemoryGoodsReceiptRepository, InMemoryPurchaseOrderRepository,
    PurchaseOrderRepository,
};
use siteledger_purchasing::{
    GoodsReceipt, GoodsReceiptId, NewPurchaseOrder, PoLineItem, PurchaseOrder, PurchaseOrderId,
    ReceiptLine, ReceiptSubmission, ReceivedTotals,
};

const LINES: usize = 20;

fn order() -> PurchaseOrder {
    let items = (0..LINES)
        .map(|i| PoLineItem {
            description: format!("Line item {i}"),
            unit: "Nos".to_string(),
            quantity: 1_000_000.0,
            rate: 10.0,
            gst_rate: 18.0,
        })
        .collect();
    PurchaseOrder::issue(
        PurchaseOrderId::new(AggregateId::new()),
        "PO-202503-0001".to_string(),
        NewPurchaseOrder {
            project_id: ProjectId::new(),
            vendor_id: VendorId::new(),
            po_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            delivery_date: None,
            items,
            terms: None,
        },
        None,
        Utc::now(),
    )
    .unwrap()
}

fn submission(order: &PurchaseOrder, seq: usize) -> ReceiptSubmission {
    ReceiptSubmission {
        po_id: order.id_typed(),
        grn_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        items: vec![
            ReceiptLine {
                po_item_index: seq % LINES,
                received_quantity: 1.0,
                remarks: None,
            },
            ReceiptLine {
                po_item_index: (seq + 7) % LINES,
                received_quantity: 2.5,
                remarks: None,
            },
        ],
        notes: None,
    }
}

fn history(order: &PurchaseOrder, len: usize) -> Vec<GoodsReceipt> {
    (0..len)
        .map(|i| {
            GoodsReceipt::record(
                GoodsReceiptId::new(AggregateId::new()),
                format!("GRN-202503-{:04}", i + 1),
                submission(order, i),
                None,
                Utc::now(),
            )
        })
        .collect()
}

fn bench_check_against_history(c: &mut Criterion) {
    let order = order();
    let incoming = submission(&order, 3);

    let mut group = c.benchmark_group("grn_check");
    for len in [10usize, 100, 1_000, 10_000] {
        let receipts = history(&order, len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &receipts, |b, receipts| {
            b.iter(|| {
                let totals = ReceivedTotals::from_receipts(&order, receipts.iter());
                black_box(totals.check(&order, &incoming.items).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_load_and_check(c: &mut Criterion) {
    let order = order();
    let incoming = submission(&order, 3);

    let mut group = c.benchmark_group("grn_load_and_check");
    for len in [100usize, 1_000] {
        let orders = Arc::new(InMemoryPurchaseOrderRepository::new());
        orders.insert(order.clone()).unwrap();
        let repo = InMemoryGoodsReceiptRepository::new(orders);
        for (i, receipt) in history(&order, len).into_iter().enumerate() {
            let expected = match i {
                0 => ExpectedVersion::NoStream,
                n => ExpectedVersion::Exact(n as u64),
            };
            repo.append(receipt, expected, order.version()).unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(len), &repo, |b, repo| {
            b.iter(|| {
                let receipts = repo.load_for_order(order.id_typed()).unwrap();
                let totals = ReceivedTotals::from_receipts(&order, &receipts);
                black_box(totals.check(&order, &incoming.items).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_check_against_history, bench_load_and_check);
criterion_main!(benches);
