use siteledger_core::{Actor, UserId};

/// Caller identity for a request, inserted by the identity middleware.
///
/// Must be present for all domain routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    actor: Actor,
}

impl CallerContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.id
    }
}
