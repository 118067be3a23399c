use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::db::models::audit::{AuditLogEntry, NewAuditEntry};
use crate::db::models::booking::{Booking, BookingDraft, BookingStatus, UpdateCustomerDetails};
use crate::db::models::document::{BookingDocument, DocumentStatus, NewDocument};
use crate::db::models::hall::BanquetHall;
use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::{NewUser, User, UserWithRole};
use crate::db::queries::{audit, bookings, documents, halls, user};
use crate::db::store::{AccountStore, AuditStore, BookingStore, StoreError, StoreResult};
use crate::workflow::Transition;

/// ✅ **PostgreSQL backend** for all three storage seams.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique and foreign-key violations become conflicts; everything else is a
/// database failure.
fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        match db_err.code().as_deref() {
            Some("23505") => {
                return StoreError::Conflict(format!(
                    "duplicate value violates {}",
                    db_err.constraint().unwrap_or("a unique constraint")
                ))
            }
            Some("23503") => {
                return StoreError::Conflict(format!(
                    "referenced row does not exist ({})",
                    db_err.constraint().unwrap_or("foreign key")
                ))
            }
            _ => {}
        }
    }
    error!("Database error: {:?}", err);
    StoreError::Database(err)
}

#[async_trait]
impl BookingStore for PgStore {
    async fn list_halls(&self, active_only: bool) -> StoreResult<Vec<BanquetHall>> {
        halls::list_halls(&self.pool, active_only).await.map_err(classify)
    }

    async fn get_hall(&self, id: Uuid) -> StoreResult<Option<BanquetHall>> {
        halls::get_hall(&self.pool, id).await.map_err(classify)
    }

    async fn create_booking(&self, draft: &BookingDraft) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        bookings::insert_booking(&mut tx, draft).await.map_err(classify)?;
        let booking = bookings::get_booking(&mut *tx, draft.id)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("booking"))?;
        tx.commit().await.map_err(classify)?;
        Ok(booking)
    }

    async fn load_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        bookings::get_booking(&self.pool, id).await.map_err(classify)
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>> {
        bookings::list_bookings(&self.pool, status).await.map_err(classify)
    }

    async fn bookings_for_owner(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        bookings::bookings_for_owner(&self.pool, user_id)
            .await
            .map_err(classify)
    }

    async fn update_customer_details(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &UpdateCustomerDetails,
    ) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let updated = bookings::update_customer_details(&mut *tx, id, expected, patch)
            .await
            .map_err(classify)?;
        if !updated {
            return Err(missing_or_moved(&mut tx, id, expected).await);
        }
        let booking = bookings::get_booking(&mut *tx, id)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("booking"))?;
        tx.commit().await.map_err(classify)?;
        Ok(booking)
    }

    async fn commit_transition(
        &self,
        transition: &Transition,
        audit_entry: NewAuditEntry,
    ) -> StoreResult<(Booking, AuditLogEntry)> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let updated = bookings::apply_transition(&mut tx, transition)
            .await
            .map_err(classify)?;
        if !updated {
            // Dropping `tx` rolls back.
            return Err(missing_or_moved(&mut tx, transition.booking_id, transition.from).await);
        }

        let entry = audit::insert_entry(&mut *tx, &audit_entry)
            .await
            .map_err(classify)?;
        let booking = bookings::get_booking(&mut *tx, transition.booking_id)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("booking"))?;

        tx.commit().await.map_err(classify)?;
        Ok((booking, entry))
    }

    async fn record_payment(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let updated = bookings::mark_paid(&mut *tx, id, paid_at)
            .await
            .map_err(classify)?;
        if !updated {
            return Err(
                match bookings::booking_exists(&mut *tx, id).await.map_err(classify) {
                    Ok(true) => StoreError::Conflict(format!(
                        "booking {} is not awaiting an unpaid advance",
                        id
                    )),
                    Ok(false) => StoreError::NotFound("booking"),
                    Err(e) => e,
                },
            );
        }
        let booking = bookings::get_booking(&mut *tx, id)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("booking"))?;
        tx.commit().await.map_err(classify)?;
        Ok(booking)
    }

    async fn add_document(&self, document: &NewDocument) -> StoreResult<BookingDocument> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let inserted = documents::insert_document(&mut *tx, document)
            .await
            .map_err(classify)?;
        let Some(stored) = inserted else {
            return Err(
                match bookings::booking_exists(&mut *tx, document.booking_id)
                    .await
                    .map_err(classify)
                {
                    Ok(true) => StoreError::Conflict(format!(
                        "booking {} no longer accepts documents",
                        document.booking_id
                    )),
                    Ok(false) => StoreError::NotFound("booking"),
                    Err(e) => e,
                },
            );
        };
        tx.commit().await.map_err(classify)?;
        Ok(stored)
    }

    async fn list_documents(&self, booking_id: Uuid) -> StoreResult<Vec<BookingDocument>> {
        documents::list_documents(&self.pool, booking_id)
            .await
            .map_err(classify)
    }

    async fn load_document(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
    ) -> StoreResult<Option<BookingDocument>> {
        documents::get_document(&self.pool, booking_id, document_id)
            .await
            .map_err(classify)
    }

    async fn set_document_status(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
        verified_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<BookingDocument> {
        documents::set_status(&self.pool, booking_id, document_id, status, verified_by, at)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("document"))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Distinguishes a missing booking from one whose status moved on.
async fn missing_or_moved(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    expected: BookingStatus,
) -> StoreError {
    match bookings::booking_exists(&mut **tx, id).await {
        Ok(true) => StoreError::Conflict(format!(
            "booking {} is no longer {}",
            id, expected
        )),
        Ok(false) => StoreError::NotFound("booking"),
        Err(e) => classify(e),
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        audit::insert_entry(&self.pool, &entry).await.map_err(classify)
    }

    async fn list_for(&self, booking_id: Uuid) -> StoreResult<Vec<AuditLogEntry>> {
        audit::list_for(&self.pool, booking_id).await.map_err(classify)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        user::insert_user(&self.pool, new_user).await.map_err(classify)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        user::get_user(&self.pool, id).await.map_err(classify)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        user::get_user_by_email(&self.pool, email)
            .await
            .map_err(classify)
    }

    async fn search_users(&self, term: Option<&str>, limit: i64) -> StoreResult<Vec<UserWithRole>> {
        user::search_users(&self.pool, term, limit)
            .await
            .map_err(classify)
    }

    async fn role_of(&self, user_id: Uuid) -> StoreResult<Option<AdminRole>> {
        user::get_role(&self.pool, user_id).await.map_err(classify)
    }

    async fn insert_role(
        &self,
        user_id: Uuid,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<UserRole> {
        user::insert_role(&self.pool, user_id, role, created_by)
            .await
            .map_err(|e| match classify(e) {
                StoreError::Conflict(msg) if msg.contains("user_roles_user_id_fkey") => {
                    StoreError::NotFound("user")
                }
                other => other,
            })
    }

    async fn update_role(&self, user_id: Uuid, role: AdminRole) -> StoreResult<UserRole> {
        user::update_role(&self.pool, user_id, role)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("role"))
    }

    async fn delete_role(&self, user_id: Uuid) -> StoreResult<()> {
        if user::delete_role(&self.pool, user_id).await.map_err(classify)? {
            Ok(())
        } else {
            Err(StoreError::NotFound("role"))
        }
    }

    async fn count_role(&self, role: AdminRole) -> StoreResult<i64> {
        user::count_role(&self.pool, role).await.map_err(classify)
    }

    async fn create_user_with_role(
        &self,
        new_user: &NewUser,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<(User, UserRole)> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        let created = user::insert_user(&mut *tx, new_user)
            .await
            .map_err(classify)?;
        let row = user::insert_role(&mut *tx, created.id, role, created_by)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;
        Ok((created, row))
    }
}
