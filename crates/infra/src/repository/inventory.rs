use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use siteledger_core::{AggregateRoot, ExpectedVersion, ProjectId};
use siteledger_inventory::{InventoryItem, InventoryItemId, StockStatus};

use crate::error::RepositoryError;

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryFilter {
    pub project_id: Option<ProjectId>,
    pub category: Option<String>,
    pub status: Option<StockStatus>,
}

impl InventoryFilter {
    pub fn matches(&self, item: &InventoryItem) -> bool {
        self.project_id.is_none_or(|p| item.project_id() == p)
            && self
                .category
                .as_deref()
                .is_none_or(|c| item.category().eq_ignore_ascii_case(c))
            && self.status.is_none_or(|s| item.status() == s)
    }
}

/// One write inside an all-or-nothing [`InventoryRepository::commit`].
#[derive(Debug, Clone)]
pub enum ItemChange {
    /// New line; fails with `Duplicate` if the id is taken.
    Insert(InventoryItem),
    /// New line that must be the only one in its project with that name
    /// (case-insensitive); fails with `Conflict` otherwise.
    InsertUniqueName(InventoryItem),
    /// Replace a stored line, compare-and-swap on its version.
    Update {
        item: InventoryItem,
        expected: ExpectedVersion,
    },
}

/// Store of inventory lines.
///
/// Writes are compare-and-swap on the item version so concurrent decrements
/// cannot both pass a stale availability check.
pub trait InventoryRepository: Send + Sync {
    fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError>;

    /// Oldest line in `project_id` whose name matches case-insensitively.
    fn find_by_name(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<InventoryItem>, RepositoryError>;

    fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryItem>, RepositoryError>;

    fn insert(&self, item: InventoryItem) -> Result<(), RepositoryError> {
        self.commit(vec![ItemChange::Insert(item)])
    }

    fn save(&self, item: InventoryItem, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        self.commit(vec![ItemChange::Update { item, expected }])
    }

    /// Apply every change or none of them.
    fn commit(&self, changes: Vec<ItemChange>) -> Result<(), RepositoryError>;

    fn delete(&self, id: InventoryItemId, expected: ExpectedVersion) -> Result<(), RepositoryError>;
}

impl<R> InventoryRepository for Arc<R>
where
    R: InventoryRepository + ?Sized,
{
    fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        (**self).get(id)
    }

    fn find_by_name(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        (**self).find_by_name(project_id, name)
    }

    fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryItem>, RepositoryError> {
        (**self).list(filter)
    }

    fn commit(&self, changes: Vec<ItemChange>) -> Result<(), RepositoryError> {
        (**self).commit(changes)
    }

    fn delete(&self, id: InventoryItemId, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).delete(id, expected)
    }
}

/// In-memory inventory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    items: RwLock<HashMap<InventoryItemId, InventoryItem>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn oldest_named<'a>(
        items: impl Iterator<Item = &'a InventoryItem>,
        project_id: ProjectId,
        name: &str,
    ) -> Option<&'a InventoryItem> {
        items
            .filter(|i| i.project_id() == project_id && i.name_matches(name))
            .min_by_key(|i| (i.created_at(), i.id_typed()))
    }
}

impl InventoryRepository for InMemoryInventoryRepository {
    fn get(&self, id: InventoryItemId) -> Result<Option<InventoryItem>, RepositoryError> {
        let map = self.items.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn find_by_name(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let map = self.items.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(Self::oldest_named(map.values(), project_id, name).cloned())
    }

    fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryItem>, RepositoryError> {
        let map = self.items.read().map_err(|_| RepositoryError::poisoned())?;
        let mut items: Vec<InventoryItem> =
            map.values().filter(|i| filter.matches(i)).cloned().collect();
        items.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(items)
    }

    fn commit(&self, changes: Vec<ItemChange>) -> Result<(), RepositoryError> {
        let mut map = self.items.write().map_err(|_| RepositoryError::poisoned())?;

        // Validate the whole batch under the write lock, then apply.
        for change in &changes {
            match change {
                ItemChange::Insert(item) => {
                    if map.contains_key(&item.id_typed()) {
                        return Err(RepositoryError::Duplicate(format!(
                            "inventory item {}",
                            item.id_typed()
                        )));
                    }
                }
                ItemChange::InsertUniqueName(item) => {
                    if map.contains_key(&item.id_typed()) {
                        return Err(RepositoryError::Duplicate(format!(
                            "inventory item {}",
                            item.id_typed()
                        )));
                    }
                    if Self::oldest_named(map.values(), item.project_id(), item.item_name())
                        .is_some()
                    {
                        return Err(RepositoryError::Conflict(format!(
                            "an item named '{}' already exists in project {}",
                            item.item_name(),
                            item.project_id()
                        )));
                    }
                }
                ItemChange::Update { item, expected } => {
                    let current = map.get(&item.id_typed()).map(|i| i.version()).unwrap_or(0);
                    if current == 0 {
                        return Err(RepositoryError::NotFound(format!(
                            "inventory item {}",
                            item.id_typed()
                        )));
                    }
                    if !expected.matches(current) {
                        return Err(RepositoryError::Conflict(format!(
                            "inventory item {}: expected {expected:?}, found {current}",
                            item.id_typed()
                        )));
                    }
                }
            }
        }

        for change in changes {
            let item = match change {
                ItemChange::Insert(item) | ItemChange::InsertUniqueName(item) => item,
                ItemChange::Update { item, .. } => item,
            };
            map.insert(item.id_typed(), item);
        }
        Ok(())
    }

    fn delete(&self, id: InventoryItemId, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut map = self.items.write().map_err(|_| RepositoryError::poisoned())?;
        let current = match map.get(&id) {
            Some(item) => item.version(),
            None => return Err(RepositoryError::NotFound(format!("inventory item {id}"))),
        };
        if !expected.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "inventory item {id}: expected {expected:?}, found {current}"
            )));
        }
        map.remove(&id);
        Ok(())
    }
}
