use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::models::audit::{AuditLogEntry, NewAuditEntry};

const AUDIT_COLUMNS: &str = r#"
    id, booking_id, action, previous_status, new_status, performed_by,
    performed_by_role, reason, created_at
"#;

pub async fn insert_entry<'e>(
    executor: impl PgExecutor<'e>,
    entry: &NewAuditEntry,
) -> Result<AuditLogEntry, sqlx::Error> {
    sqlx::query_as::<_, AuditLogEntry>(&format!(
        r#"
        INSERT INTO audit_logs (
            id, booking_id, action, previous_status, new_status,
            performed_by, performed_by_role, reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {AUDIT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(entry.booking_id)
    .bind(&entry.action)
    .bind(entry.previous_status)
    .bind(entry.new_status)
    .bind(entry.performed_by)
    .bind(entry.performed_by_role)
    .bind(&entry.reason)
    .fetch_one(executor)
    .await
}

/// Newest first; `seq` breaks ties between entries in the same instant.
pub async fn list_for<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditLogEntry>(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE booking_id = $1 ORDER BY seq DESC"
    ))
    .bind(booking_id)
    .fetch_all(executor)
    .await
}
