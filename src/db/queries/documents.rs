use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::models::document::{BookingDocument, DocumentStatus, NewDocument};

const DOCUMENT_COLUMNS: &str = r#"
    id, booking_id, document_type, document_name, file_url, status,
    uploaded_at, verified_at, verified_by
"#;

/// Inserts only while the booking still accepts customer documents; `None`
/// when the booking is missing or has moved past `pending`/`change_requested`.
pub async fn insert_document<'e>(
    executor: impl PgExecutor<'e>,
    document: &NewDocument,
) -> Result<Option<BookingDocument>, sqlx::Error> {
    sqlx::query_as::<_, BookingDocument>(&format!(
        r#"
        INSERT INTO booking_documents (id, booking_id, document_type, document_name, file_url)
        SELECT $1, $2, $3, $4, $5
         WHERE EXISTS (
               SELECT 1 FROM bookings
                WHERE id = $2 AND status IN ('pending', 'change_requested')
         )
        RETURNING {DOCUMENT_COLUMNS}
        "#
    ))
    .bind(document.id)
    .bind(document.booking_id)
    .bind(document.document_type)
    .bind(&document.document_name)
    .bind(&document.file_url)
    .fetch_optional(executor)
    .await
}

pub async fn list_documents<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Vec<BookingDocument>, sqlx::Error> {
    sqlx::query_as::<_, BookingDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM booking_documents WHERE booking_id = $1 ORDER BY uploaded_at DESC"
    ))
    .bind(booking_id)
    .fetch_all(executor)
    .await
}

pub async fn get_document<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
    document_id: Uuid,
) -> Result<Option<BookingDocument>, sqlx::Error> {
    sqlx::query_as::<_, BookingDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM booking_documents WHERE id = $1 AND booking_id = $2"
    ))
    .bind(document_id)
    .bind(booking_id)
    .fetch_optional(executor)
    .await
}

pub async fn set_status<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
    document_id: Uuid,
    status: DocumentStatus,
    verified_by: Uuid,
    at: DateTime<Utc>,
) -> Result<Option<BookingDocument>, sqlx::Error> {
    sqlx::query_as::<_, BookingDocument>(&format!(
        r#"
        UPDATE booking_documents
           SET status = $3, verified_by = $4, verified_at = $5
         WHERE id = $1 AND booking_id = $2
        RETURNING {DOCUMENT_COLUMNS}
        "#
    ))
    .bind(document_id)
    .bind(booking_id)
    .bind(status)
    .bind(verified_by)
    .bind(at)
    .fetch_optional(executor)
    .await
}
