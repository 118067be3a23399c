//! Append-only history of booking transitions.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::db::models::audit::{AuditLogEntry, NewAuditEntry};
use crate::db::store::{AuditStore, StoreResult};
use crate::workflow::Transition;

/// The audit log: appends, reads and the one place entries are shaped.
///
/// Workflow entries are written by the booking store in the same unit as the
/// status change they describe. `record` appends anything else worth keeping
/// beside them. Nothing here updates or deletes an entry.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Entry describing `transition`, performed by `actor_id`.
    pub fn entry_for(transition: &Transition, actor_id: Uuid) -> NewAuditEntry {
        NewAuditEntry {
            booking_id: transition.booking_id,
            action: transition.label().to_string(),
            previous_status: transition.from,
            new_status: transition.to,
            performed_by: actor_id,
            performed_by_role: transition.actor_role,
            reason: transition.notes.clone(),
        }
    }

    /// Appends one immutable entry.
    pub async fn record(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let stored = self.store.record(entry).await?;
        info!(
            booking_id = %stored.booking_id,
            action = %stored.action,
            "Audit entry recorded"
        );
        Ok(stored)
    }

    /// History of one booking, newest first.
    pub async fn list_for(&self, booking_id: Uuid) -> StoreResult<Vec<AuditLogEntry>> {
        self.store.list_for(booking_id).await
    }
}
