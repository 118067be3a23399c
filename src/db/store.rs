use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::audit::{AuditLogEntry, NewAuditEntry};
use crate::db::models::booking::{Booking, BookingDraft, BookingStatus, UpdateCustomerDetails};
use crate::db::models::document::{BookingDocument, DocumentStatus, NewDocument};
use crate::db::models::hall::BanquetHall;
use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::{NewUser, User, UserWithRole};
use crate::workflow::Transition;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by every storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A compare-and-swap lost the race or a unique constraint was hit.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Bookings, the hall catalog and booking documents.
///
/// Every write that depends on the booking's status takes the status the
/// caller validated against and fails with [`StoreError::Conflict`] when the
/// persisted status no longer matches.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // ── Halls ──

    async fn list_halls(&self, active_only: bool) -> StoreResult<Vec<BanquetHall>>;
    async fn get_hall(&self, id: Uuid) -> StoreResult<Option<BanquetHall>>;

    // ── Bookings ──

    async fn create_booking(&self, draft: &BookingDraft) -> StoreResult<Booking>;
    async fn load_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;
    /// Newest first, optionally restricted to one status.
    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>>;
    async fn bookings_for_owner(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;
    async fn update_customer_details(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &UpdateCustomerDetails,
    ) -> StoreResult<Booking>;

    /// Applies a workflow transition and appends its audit entry as one unit.
    async fn commit_transition(
        &self,
        transition: &Transition,
        audit: NewAuditEntry,
    ) -> StoreResult<(Booking, AuditLogEntry)>;

    /// Marks the advance as paid. Only valid while `payment_pending` and unpaid.
    async fn record_payment(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Booking>;

    // ── Documents ──

    /// Refused with [`StoreError::Conflict`] unless the booking is still
    /// `pending` or `change_requested` at write time.
    async fn add_document(&self, document: &NewDocument) -> StoreResult<BookingDocument>;
    /// Newest upload first.
    async fn list_documents(&self, booking_id: Uuid) -> StoreResult<Vec<BookingDocument>>;
    async fn load_document(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
    ) -> StoreResult<Option<BookingDocument>>;
    async fn set_document_status(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
        verified_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<BookingDocument>;

    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Append-only audit history.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry>;
    /// Newest first.
    async fn list_for(&self, booking_id: Uuid) -> StoreResult<Vec<AuditLogEntry>>;
}

/// User accounts and their (zero or one) admin role.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn search_users(&self, term: Option<&str>, limit: i64) -> StoreResult<Vec<UserWithRole>>;

    async fn role_of(&self, user_id: Uuid) -> StoreResult<Option<AdminRole>>;
    async fn insert_role(
        &self,
        user_id: Uuid,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<UserRole>;
    async fn update_role(&self, user_id: Uuid, role: AdminRole) -> StoreResult<UserRole>;
    async fn delete_role(&self, user_id: Uuid) -> StoreResult<()>;
    async fn count_role(&self, role: AdminRole) -> StoreResult<i64>;

    /// Creates the account and its role together; neither exists on failure.
    async fn create_user_with_role(
        &self,
        user: &NewUser,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<(User, UserRole)>;
}

/// The three storage seams, usually backed by one object.
#[derive(Clone)]
pub struct Stores {
    pub bookings: Arc<dyn BookingStore>,
    pub audit: Arc<dyn AuditStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: BookingStore + AuditStore + AccountStore + 'static,
    {
        Self {
            bookings: backend.clone(),
            audit: backend.clone(),
            accounts: backend,
        }
    }
}
