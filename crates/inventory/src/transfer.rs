//! Inter-project stock transfers.
//!
//! A transfer decrements a source line and increments (or creates) a line in a
//! different project. Preconditions are checked in a fixed order and nothing is
//! mutated unless all of them hold; persisting both sides atomically is the
//! caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::quantity::ensure_positive;
use siteledger_core::{DomainError, DomainResult, ProjectId, UserId};

use crate::item::{InventoryItem, InventoryItemId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_item_id: InventoryItemId,
    pub to_project_id: ProjectId,
    #[serde(default)]
    pub to_item_id: Option<InventoryItemId>,
    pub quantity: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Where the transferred stock lands.
#[derive(Debug)]
pub enum TransferDestination<'a> {
    /// A line the caller already loaded.
    Existing(&'a mut InventoryItem),
    /// Create a fresh line in the destination project.
    NewItem {
        id: InventoryItemId,
        created_by: Option<UserId>,
    },
}

/// Caller-facing summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub message: String,
    pub item_name: String,
    pub transferred_quantity: f64,
    pub unit: String,
    pub source_item_id: InventoryItemId,
    pub destination_item_id: InventoryItemId,
    pub destination_created: bool,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub receipt: TransferReceipt,
    /// Set when the destination line was created by this transfer.
    pub created: Option<InventoryItem>,
}

impl TransferRequest {
    /// Quantity, then availability, then project distinctness.
    pub fn check_preconditions(&self, source: &InventoryItem) -> DomainResult<()> {
        ensure_positive(self.quantity, "quantity")?;
        source.ensure_available(self.quantity)?;
        if source.project_id() == self.to_project_id {
            return Err(DomainError::SameProject {
                project_id: self.to_project_id,
            });
        }
        Ok(())
    }

    /// Apply the transfer to in-memory state.
    ///
    /// On error neither `source` nor the destination has been modified.
    pub fn execute(
        &self,
        source: &mut InventoryItem,
        destination: TransferDestination<'_>,
        now: DateTime<Utc>,
    ) -> DomainResult<TransferOutcome> {
        self.check_preconditions(source)?;

        if let TransferDestination::Existing(dest) = &destination {
            if dest.project_id() != self.to_project_id {
                return Err(DomainError::validation(format!(
                    "destination item {} does not belong to project {}",
                    dest.id_typed(),
                    self.to_project_id
                )));
            }
            if dest.id_typed() == source.id_typed() {
                return Err(DomainError::validation(
                    "destination item must differ from the source item",
                ));
            }
        }

        source.withdraw(self.quantity, now)?;

        let (destination_item_id, created) = match destination {
            TransferDestination::Existing(dest) => {
                dest.deposit(self.quantity, now)?;
                (dest.id_typed(), None)
            }
            TransferDestination::NewItem { id, created_by } => {
                let notes = Some(match self.notes.as_deref() {
                    Some(n) if !n.trim().is_empty() => format!("Transferred from project. {n}"),
                    _ => "Transferred from project.".to_string(),
                });
                let item =
                    source.split_into(id, self.to_project_id, self.quantity, notes, created_by, now);
                (id, Some(item))
            }
        };

        let receipt = TransferReceipt {
            message: format!(
                "Transferred {} {} of '{}' successfully",
                self.quantity,
                source.unit(),
                source.item_name()
            ),
            item_name: source.item_name().to_string(),
            transferred_quantity: self.quantity,
            unit: source.unit().to_string(),
            source_item_id: source.id_typed(),
            destination_item_id,
            destination_created: created.is_some(),
        };

        Ok(TransferOutcome { receipt, created })
    }
}
