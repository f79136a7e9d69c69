//! Response supersession ledger.
//!
//! Maps each room to the ticket of its most recently started run. A run may
//! only emit output while its ticket is still current; a newer message for
//! the same room silently invalidates older runs without cancelling them.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// Runtime-scoped table of current response tickets, keyed by room id.
///
/// Cloning shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct ResponseLedger {
    tickets: Arc<DashMap<Uuid, Uuid>>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `ticket` current for `room_id`, returning the ticket it replaced.
    pub fn install(&self, room_id: Uuid, ticket: Uuid) -> Option<Uuid> {
        self.tickets.insert(room_id, ticket)
    }

    pub fn current(&self, room_id: &Uuid) -> Option<Uuid> {
        self.tickets.get(room_id).map(|t| *t.value())
    }

    pub fn is_current(&self, room_id: &Uuid, ticket: &Uuid) -> bool {
        self.tickets
            .get(room_id)
            .is_some_and(|t| t.value() == ticket)
    }

    /// Remove the room's entry only if `ticket` still holds it.
    ///
    /// Returns whether the entry was removed. A superseded run calling this
    /// leaves the newer ticket in place.
    pub fn clear_if_current(&self, room_id: &Uuid, ticket: &Uuid) -> bool {
        self.tickets
            .remove_if(room_id, |_, current| current == ticket)
            .is_some()
    }

    /// Number of rooms with a run in flight.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
