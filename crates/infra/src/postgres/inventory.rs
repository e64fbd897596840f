use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use siteledger_core::{AggregateRoot, ExpectedVersion, ProjectId};
use siteledger_inventory::{InventoryItem, InventoryItemId};

use super::{PgExecutor, decode_error, is_unique_violation, map_sqlx_error, version_param};
use crate::error::RepositoryError;
use crate::repository::{InventoryFilter, InventoryRepository, ItemChange};

/// Inventory lines in `inventory_items`.
#[derive(Debug, Clone)]
pub struct PostgresInventoryRepository {
    db: PgExecutor,
}

impl PostgresInventoryRepository {
    pub fn new(db: PgExecutor) -> Self {
        Self { db }
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<InventoryItem, RepositoryError> {
    row.try_get::<Json<InventoryItem>, _>("doc")
        .map(|doc| doc.0)
        .map_err(|e| decode_error("inventory item", e))
}

async fn insert(
    conn: &mut PgConnection,
    item: &InventoryItem,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_items
            (id, project_id, item_name, category, status, created_at, version, doc)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(*item.id_typed().0.as_uuid())
    .bind(*item.project_id().as_uuid())
    .bind(item.item_name())
    .bind(item.category())
    .bind(item.status().as_str())
    .bind(item.created_at())
    .bind(item.version() as i64)
    .bind(Json(item))
    .execute(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RepositoryError::Duplicate(format!("inventory item {}", item.id_typed()))
        } else {
            map_sqlx_error("insert inventory item", e)
        }
    })?;
    Ok(())
}

/// Tell a missing row from a stale one after a conditional write hit nothing.
async fn explain_miss(
    conn: &mut PgConnection,
    id: InventoryItemId,
    expected: ExpectedVersion,
) -> RepositoryError {
    let found = sqlx::query_scalar::<_, i64>("SELECT version FROM inventory_items WHERE id = $1")
        .bind(*id.0.as_uuid())
        .fetch_optional(conn)
        .await;
    match found {
        Ok(Some(current)) => RepositoryError::Conflict(format!(
            "inventory item {id}: expected {expected:?}, found {current}"
        )),
        Ok(None) => RepositoryError::NotFound(format!("inventory item {id}")),
        Err(e) => map_sqlx_error("inventory item version", e),
    }
}

async fn apply(conn: &mut PgConnection, change: &ItemChange) -> Result<(), RepositoryError> {
    match change {
        ItemChange::Insert(item) => insert(conn, item).await,
        ItemChange::InsertUniqueName(item) => {
            // Serializes creators of the same (project, name) until commit.
            let key = format!(
                "inventory:{}:{}",
                item.project_id(),
                item.item_name().trim().to_lowercase()
            );
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(&key)
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("lock item name", e))?;

            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM inventory_items
                    WHERE project_id = $1 AND lower(item_name) = lower(btrim($2))
                )
                "#,
            )
            .bind(*item.project_id().as_uuid())
            .bind(item.item_name())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("check item name", e))?;
            if taken {
                return Err(RepositoryError::Conflict(format!(
                    "an item named '{}' already exists in project {}",
                    item.item_name(),
                    item.project_id()
                )));
            }
            insert(conn, item).await
        }
        ItemChange::Update { item, expected } => {
            let updated = sqlx::query(
                r#"
                UPDATE inventory_items
                SET item_name = $3, category = $4, status = $5, version = $6, doc = $7
                WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)
                "#,
            )
            .bind(*item.id_typed().0.as_uuid())
            .bind(version_param(*expected))
            .bind(item.item_name())
            .bind(item.category())
            .bind(item.status().as_str())
            .bind(item.version() as i64)
            .bind(Json(item))
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("update inventory item", e))?;
            if updated.rows_affected() == 0 {
                return Err(explain_miss(conn, item.id_typed(), *expected).await);
            }
            Ok(())
        }
    }
}

impl InventoryRepository for PostgresInventoryRepository {
    fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query("SELECT doc FROM inventory_items WHERE id = $1")
                .bind(*id.0.as_uuid())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("get inventory item", e))?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn find_by_name(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query(
                r#"
                SELECT doc FROM inventory_items
                WHERE project_id = $1 AND lower(item_name) = lower(btrim($2))
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                "#,
            )
            .bind(*project_id.as_uuid())
            .bind(name)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("find inventory item by name", e))?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryItem>, RepositoryError> {
        let project: Option<Uuid> = filter.project_id.map(|p| *p.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        self.db.run(async {
            let rows = sqlx::query(
                r#"
                SELECT doc FROM inventory_items
                WHERE ($1::UUID IS NULL OR project_id = $1)
                  AND ($2::TEXT IS NULL OR lower(category) = lower($2))
                  AND ($3::TEXT IS NULL OR status = $3)
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(project)
            .bind(filter.category.as_deref())
            .bind(status)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("list inventory items", e))?;
            rows.iter().map(decode).collect()
        })
    }

    fn commit(&self, changes: Vec<ItemChange>) -> Result<(), RepositoryError> {
        self.db.run(async {
            let mut tx = self
                .db
                .pool()
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin transaction", e))?;
            for change in &changes {
                // Dropping `tx` on error rolls the batch back.
                apply(&mut tx, change).await?;
            }
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit transaction", e))
        })
    }

    fn delete(&self, id: InventoryItemId, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        self.db.run(async {
            let mut conn = self
                .db
                .pool()
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("acquire connection", e))?;
            let deleted = sqlx::query(
                "DELETE FROM inventory_items WHERE id = $1 AND ($2::BIGINT IS NULL OR version = $2)",
            )
            .bind(*id.0.as_uuid())
            .bind(version_param(expected))
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("delete inventory item", e))?;
            if deleted.rows_affected() == 0 {
                return Err(explain_miss(&mut conn, id, expected).await);
            }
            Ok(())
        })
    }
}
