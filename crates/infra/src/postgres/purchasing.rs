use sqlx::Row;
use sqlx::types::Json;
use uuid::Uuid;

use siteledger_core::{AggregateRoot, ExpectedVersion};
use siteledger_purchasing::{GoodsReceipt, GoodsReceiptId, PurchaseOrder, PurchaseOrderId};

use super::{PgExecutor, decode_error, is_unique_violation, map_sqlx_error, version_param};
use crate::error::RepositoryError;
use crate::repository::{GoodsReceiptRepository, PurchaseOrderFilter, PurchaseOrderRepository};

/// Purchase orders in `purchase_orders`.
#[derive(Debug, Clone)]
pub struct PostgresPurchaseOrderRepository {
    db: PgExecutor,
}

impl PostgresPurchaseOrderRepository {
    pub fn new(db: PgExecutor) -> Self {
        Self { db }
    }
}

fn decode_order(row: &sqlx::postgres::PgRow) -> Result<PurchaseOrder, RepositoryError> {
    row.try_get::<Json<PurchaseOrder>, _>("doc")
        .map(|doc| doc.0)
        .map_err(|e| decode_error("purchase order", e))
}

fn decode_receipt(row: &sqlx::postgres::PgRow) -> Result<GoodsReceipt, RepositoryError> {
    row.try_get::<Json<GoodsReceipt>, _>("doc")
        .map(|doc| doc.0)
        .map_err(|e| decode_error("goods receipt", e))
}

impl PurchaseOrderRepository for PostgresPurchaseOrderRepository {
    fn get(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query("SELECT doc FROM purchase_orders WHERE id = $1")
                .bind(*id.0.as_uuid())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("get purchase order", e))?;
            row.as_ref().map(decode_order).transpose()
        })
    }

    fn list(&self, filter: &PurchaseOrderFilter) -> Result<Vec<PurchaseOrder>, RepositoryError> {
        let project: Option<Uuid> = filter.project_id.map(|p| *p.as_uuid());
        let vendor: Option<Uuid> = filter.vendor_id.map(|v| *v.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        self.db.run(async {
            let rows = sqlx::query(
                r#"
                SELECT doc FROM purchase_orders
                WHERE ($1::UUID IS NULL OR project_id = $1)
                  AND ($2::UUID IS NULL OR vendor_id = $2)
                  AND ($3::TEXT IS NULL OR status = $3)
                ORDER BY created_at DESC
                "#,
            )
            .bind(project)
            .bind(vendor)
            .bind(status)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("list purchase orders", e))?;
            rows.iter().map(decode_order).collect()
        })
    }

    fn insert(&self, order: PurchaseOrder) -> Result<(), RepositoryError> {
        self.db.run(async {
            sqlx::query(
                r#"
                INSERT INTO purchase_orders
                    (id, po_number, project_id, vendor_id, status, created_at, version, doc)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(*order.id_typed().0.as_uuid())
            .bind(order.po_number())
            .bind(*order.project_id().as_uuid())
            .bind(*order.vendor_id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.created_at())
            .bind(order.version() as i64)
            .bind(Json(&order))
            .execute(self.db.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Duplicate(format!(
                        "purchase order {} / po_number {}",
                        order.id_typed(),
                        order.po_number()
                    ))
                } else {
                    map_sqlx_error("insert purchase order", e)
                }
            })?;
            Ok(())
        })
    }

    fn save(&self, order: PurchaseOrder, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        self.db.run(async {
            let updated = sqlx::query(
                r#"
                UPDATE purchase_orders
                SET status = $3, version = $4, doc = $5
                WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)
                "#,
            )
            .bind(*order.id_typed().0.as_uuid())
            .bind(version_param(expected))
            .bind(order.status().as_str())
            .bind(order.version() as i64)
            .bind(Json(&order))
            .execute(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("update purchase order", e))?;
            if updated.rows_affected() > 0 {
                return Ok(());
            }

            let current = sqlx::query_scalar::<_, i64>("SELECT version FROM purchase_orders WHERE id = $1")
                .bind(*order.id_typed().0.as_uuid())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("purchase order version", e))?;
            Err(match current {
                Some(current) => RepositoryError::Conflict(format!(
                    "purchase order {}: expected {expected:?}, found {current}",
                    order.id_typed()
                )),
                None => RepositoryError::NotFound(format!("purchase order {}", order.id_typed())),
            })
        })
    }
}

const STREAM_POSITION_KEY: &str = "goods_receipts_po_id_seq_key";

/// Receipt streams in `goods_receipts`, one row per receipt keyed by
/// `(po_id, seq)`.
#[derive(Debug, Clone)]
pub struct PostgresGoodsReceiptRepository {
    db: PgExecutor,
}

impl PostgresGoodsReceiptRepository {
    pub fn new(db: PgExecutor) -> Self {
        Self { db }
    }
}

impl GoodsReceiptRepository for PostgresGoodsReceiptRepository {
    fn get(&self, id: GoodsReceiptId) -> Result<Option<GoodsReceipt>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query("SELECT doc FROM goods_receipts WHERE id = $1")
                .bind(*id.0.as_uuid())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("get goods receipt", e))?;
            row.as_ref().map(decode_receipt).transpose()
        })
    }

    fn load_for_order(&self, po_id: PurchaseOrderId) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        self.db.run(async {
            let rows = sqlx::query("SELECT doc FROM goods_receipts WHERE po_id = $1 ORDER BY seq ASC")
                .bind(*po_id.0.as_uuid())
                .fetch_all(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("load receipt stream", e))?;
            rows.iter().map(decode_receipt).collect()
        })
    }

    fn list(&self, po_id: Option<PurchaseOrderId>) -> Result<Vec<GoodsReceipt>, RepositoryError> {
        let po: Option<Uuid> = po_id.map(|p| *p.0.as_uuid());
        self.db.run(async {
            let rows = sqlx::query(
                r#"
                SELECT doc FROM goods_receipts
                WHERE ($1::UUID IS NULL OR po_id = $1)
                ORDER BY created_at DESC
                "#,
            )
            .bind(po)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("list goods receipts", e))?;
            rows.iter().map(decode_receipt).collect()
        })
    }

    fn append(
        &self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
        order_version: u64,
    ) -> Result<(), RepositoryError> {
        self.db.run(async {
            let mut tx = self
                .db
                .pool()
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin transaction", e))?;

            // The share lock holds off status changes until this receipt commits.
            let current_order = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM purchase_orders WHERE id = $1 FOR SHARE",
            )
            .bind(*receipt.po_id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock purchase order", e))?;
            match current_order {
                None => {
                    return Err(RepositoryError::NotFound(format!(
                        "purchase order {}",
                        receipt.po_id
                    )));
                }
                Some(v) if v as u64 != order_version => {
                    return Err(RepositoryError::Conflict(format!(
                        "purchase order {}: expected version {order_version}, found {v}",
                        receipt.po_id
                    )));
                }
                Some(_) => {}
            }

            let current: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM goods_receipts WHERE po_id = $1")
                .bind(*receipt.po_id.0.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("receipt stream length", e))?;
            if !expected.matches(current as u64) {
                return Err(RepositoryError::Conflict(format!(
                    "receipts for purchase order {}: expected {expected:?}, found {current}",
                    receipt.po_id
                )));
            }

            let seq = current + 1;
            sqlx::query(
                r#"
                INSERT INTO goods_receipts (id, po_id, seq, grn_number, created_at, doc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(*receipt.id.0.as_uuid())
            .bind(*receipt.po_id.0.as_uuid())
            .bind(seq)
            .bind(&receipt.grn_number)
            .bind(receipt.created_at)
            .bind(Json(&receipt))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent append took this stream position first.
                if is_unique_violation(&e) && constraint(&e) == Some(STREAM_POSITION_KEY) {
                    RepositoryError::Conflict(format!(
                        "receipts for purchase order {}: position {seq} already taken",
                        receipt.po_id
                    ))
                } else {
                    map_sqlx_error("append goods receipt", e)
                }
            })?;

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit transaction", e))
        })
    }
}

fn constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}
