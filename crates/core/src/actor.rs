//! Caller identity attached to records created by the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::UserId;

/// Identity of whoever triggered an operation.
///
/// Supplied by the identity layer in front of the engine; the engine never
/// evaluates permissions, it only stamps records and audit entries with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Identity used for work the engine performs on its own behalf.
    pub fn system() -> Self {
        Self {
            id: UserId::from_uuid(Uuid::nil()),
            name: "system".to_string(),
        }
    }
}
