use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use siteledger_purchasing::{DocumentKind, DocumentPeriod, format_document_number};

use crate::error::RepositoryError;

/// Monotonic per-(kind, month) document counter.
pub trait DocumentSequence: Send + Sync {
    /// Reserve the next value. Values are never handed out twice, even if the
    /// document they were reserved for is never stored.
    fn next_value(&self, kind: DocumentKind, period: DocumentPeriod) -> Result<u64, RepositoryError>;

    fn next_number(&self, kind: DocumentKind, period: DocumentPeriod) -> Result<String, RepositoryError> {
        let value = self.next_value(kind, period)?;
        Ok(format_document_number(kind, period, value))
    }
}

impl<S> DocumentSequence for Arc<S>
where
    S: DocumentSequence + ?Sized,
{
    fn next_value(&self, kind: DocumentKind, period: DocumentPeriod) -> Result<u64, RepositoryError> {
        (**self).next_value(kind, period)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentSequence {
    counters: Mutex<HashMap<(DocumentKind, DocumentPeriod), u64>>,
}

impl InMemoryDocumentSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSequence for InMemoryDocumentSequence {
    fn next_value(&self, kind: DocumentKind, period: DocumentPeriod) -> Result<u64, RepositoryError> {
        let mut counters = self.counters.lock().map_err(|_| RepositoryError::poisoned())?;
        let counter = counters.entry((kind, period)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
