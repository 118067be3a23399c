use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::booking::BookingStatus;
use super::role::AdminRole;

/// Immutable record of one successful status transition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Human readable action label, e.g. "Payment Requested"
    pub action: String,
    pub previous_status: BookingStatus,
    pub new_status: BookingStatus,
    pub performed_by: Uuid,
    pub performed_by_role: AdminRole,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub booking_id: Uuid,
    pub action: String,
    pub previous_status: BookingStatus,
    pub new_status: BookingStatus,
    pub performed_by: Uuid,
    pub performed_by_role: AdminRole,
    pub reason: Option<String>,
}

impl NewAuditEntry {
    pub fn into_entry(self, id: Uuid, created_at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id,
            booking_id: self.booking_id,
            action: self.action,
            previous_status: self.previous_status,
            new_status: self.new_status,
            performed_by: self.performed_by,
            performed_by_role: self.performed_by_role,
            reason: self.reason,
            created_at,
        }
    }
}
