use siteledger_purchasing::{DocumentKind, DocumentPeriod};

use super::{PgExecutor, map_sqlx_error};
use crate::error::RepositoryError;
use crate::sequence::DocumentSequence;

/// Counter rows in `document_sequences`, one per (kind, month).
#[derive(Debug, Clone)]
pub struct PostgresDocumentSequence {
    db: PgExecutor,
}

impl PostgresDocumentSequence {
    pub fn new(db: PgExecutor) -> Self {
        Self { db }
    }
}

fn period_key(period: DocumentPeriod) -> String {
    format!("{:04}{:02}", period.year, period.month)
}

impl DocumentSequence for PostgresDocumentSequence {
    fn next_value(&self, kind: DocumentKind, period: DocumentPeriod) -> Result<u64, RepositoryError> {
        self.db.run(async {
            let value: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO document_sequences (kind, period, value)
                VALUES ($1, $2, 1)
                ON CONFLICT (kind, period)
                DO UPDATE SET value = document_sequences.value + 1
                RETURNING value
                "#,
            )
            .bind(kind.prefix())
            .bind(period_key(period))
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("reserve document number", e))?;
            Ok(value as u64)
        })
    }
}
