use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::audit::{AuditLogEntry, NewAuditEntry};
use crate::db::models::booking::{
    Booking, BookingDraft, BookingStatus, PaymentStatus, UpdateCustomerDetails,
};
use crate::db::models::document::{BookingDocument, DocumentStatus, NewDocument};
use crate::db::models::hall::BanquetHall;
use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::{NewUser, User, UserWithRole};
use crate::db::store::{
    AccountStore, AuditStore, BookingStore, StoreError, StoreResult,
};
use crate::workflow::{NoteField, SideEffect, Transition};

#[derive(Default)]
struct State {
    halls: HashMap<Uuid, BanquetHall>,
    bookings: HashMap<Uuid, Booking>,
    documents: Vec<BookingDocument>,
    /// Append order is the audit sequence
    audit: Vec<AuditLogEntry>,
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, UserRole>,
}

/// In-process backend for tests and `STORAGE_BACKEND=memory`.
///
/// One mutex guards all state, so every trait method is a single atomic unit,
/// including the status compare-and-swap in `commit_transition`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only mutated after all checks pass, so a poisoned guard
        // still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn insert_hall(&self, hall: BanquetHall) -> BanquetHall {
        self.lock().halls.insert(hall.id, hall.clone());
        hall
    }

    /// Stores a booking as-is, bypassing creation rules.
    #[cfg(test)]
    pub fn seed_booking(&self, booking: Booking) -> Booking {
        self.lock().bookings.insert(booking.id, booking.clone());
        booking
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn conflict_if_status_moved(booking: &Booking, expected: BookingStatus) -> StoreResult<()> {
    if booking.status != expected {
        return Err(StoreError::Conflict(format!(
            "booking {} is {}, expected {}",
            booking.id, booking.status, expected
        )));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn list_halls(&self, active_only: bool) -> StoreResult<Vec<BanquetHall>> {
        let mut halls: Vec<BanquetHall> = self
            .lock()
            .halls
            .values()
            .filter(|h| !active_only || h.is_active)
            .cloned()
            .collect();
        halls.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(halls)
    }

    async fn get_hall(&self, id: Uuid) -> StoreResult<Option<BanquetHall>> {
        Ok(self.lock().halls.get(&id).cloned())
    }

    async fn create_booking(&self, draft: &BookingDraft) -> StoreResult<Booking> {
        let mut state = self.lock();
        if state.bookings.contains_key(&draft.id) {
            return Err(StoreError::Conflict(format!("booking {} already exists", draft.id)));
        }
        if let Some(missing) = draft.hall_ids.iter().find(|id| !state.halls.contains_key(id)) {
            return Err(StoreError::Conflict(format!("hall {} does not exist", missing)));
        }

        let now = Utc::now();
        let booking = Booking {
            id: draft.id,
            user_id: draft.user_id,
            booking_date: draft.booking_date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            hall_ids: draft.hall_ids.clone(),
            status: BookingStatus::Pending,
            total_amount: draft.total_amount.clone(),
            notes: draft.notes.clone(),
            customer_name: draft.customer_name.clone(),
            customer_email: draft.customer_email.clone(),
            customer_phone: draft.customer_phone.clone(),
            event_type: draft.event_type.clone(),
            guest_count: draft.guest_count,
            special_requests: draft.special_requests.clone(),
            admin1_notes: None,
            admin2_notes: None,
            super_admin_notes: None,
            payment_status: PaymentStatus::Unpaid,
            payment_date: None,
            advance_amount: None,
            confirmation_number: None,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn load_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.lock().bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn bookings_for_owner(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn update_customer_details(
        &self,
        id: Uuid,
        expected: BookingStatus,
        patch: &UpdateCustomerDetails,
    ) -> StoreResult<Booking> {
        let mut state = self.lock();
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::NotFound("booking"))?;
        conflict_if_status_moved(booking, expected)?;

        if let Some(name) = &patch.customer_name {
            booking.customer_name = name.clone();
        }
        if let Some(email) = &patch.customer_email {
            booking.customer_email = email.clone();
        }
        if patch.customer_phone.is_some() {
            booking.customer_phone = patch.customer_phone.clone();
        }
        if patch.event_type.is_some() {
            booking.event_type = patch.event_type.clone();
        }
        if patch.guest_count.is_some() {
            booking.guest_count = patch.guest_count;
        }
        if patch.special_requests.is_some() {
            booking.special_requests = patch.special_requests.clone();
        }
        if patch.notes.is_some() {
            booking.notes = patch.notes.clone();
        }
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn commit_transition(
        &self,
        transition: &Transition,
        audit: NewAuditEntry,
    ) -> StoreResult<(Booking, AuditLogEntry)> {
        let mut state = self.lock();

        if let SideEffect::Confirmed(number) = &transition.effect {
            let taken = state.bookings.values().any(|b| {
                b.id != transition.booking_id && b.confirmation_number.as_deref() == Some(number.as_str())
            });
            if taken {
                return Err(StoreError::Conflict(format!(
                    "confirmation number {} already issued",
                    number
                )));
            }
        }

        let booking = state
            .bookings
            .get_mut(&transition.booking_id)
            .ok_or(StoreError::NotFound("booking"))?;
        conflict_if_status_moved(booking, transition.from)?;

        let now = Utc::now();
        booking.status = transition.to;
        match transition.note_field {
            NoteField::Admin1 => booking.admin1_notes = transition.notes.clone(),
            NoteField::Admin2 => booking.admin2_notes = transition.notes.clone(),
            NoteField::SuperAdmin => booking.super_admin_notes = transition.notes.clone(),
        }
        match &transition.effect {
            SideEffect::None => {}
            SideEffect::AdvanceRequested(amount) => booking.advance_amount = Some(amount.clone()),
            SideEffect::Confirmed(number) => booking.confirmation_number = Some(number.clone()),
        }
        booking.updated_at = now;
        let booking = booking.clone();

        let entry = audit.into_entry(Uuid::new_v4(), now);
        state.audit.push(entry.clone());
        Ok((booking, entry))
    }

    async fn record_payment(&self, id: Uuid, paid_at: DateTime<Utc>) -> StoreResult<Booking> {
        let mut state = self.lock();
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::NotFound("booking"))?;
        conflict_if_status_moved(booking, BookingStatus::PaymentPending)?;
        if booking.payment_status == PaymentStatus::Paid {
            return Err(StoreError::Conflict(format!("booking {} is already paid", id)));
        }

        booking.payment_status = PaymentStatus::Paid;
        booking.payment_date = Some(paid_at);
        booking.updated_at = paid_at;
        Ok(booking.clone())
    }

    async fn add_document(&self, document: &NewDocument) -> StoreResult<BookingDocument> {
        let mut state = self.lock();
        let booking = state
            .bookings
            .get(&document.booking_id)
            .ok_or(StoreError::NotFound("booking"))?;
        if !booking.status.is_customer_editable() {
            return Err(StoreError::Conflict(format!(
                "booking {} is {} and no longer accepts documents",
                booking.id, booking.status
            )));
        }
        let stored = BookingDocument {
            id: document.id,
            booking_id: document.booking_id,
            document_type: document.document_type,
            document_name: document.document_name.clone(),
            file_url: document.file_url.clone(),
            status: DocumentStatus::Pending,
            uploaded_at: Utc::now(),
            verified_at: None,
            verified_by: None,
        };
        state.documents.push(stored.clone());
        Ok(stored)
    }

    async fn list_documents(&self, booking_id: Uuid) -> StoreResult<Vec<BookingDocument>> {
        Ok(self
            .lock()
            .documents
            .iter()
            .rev()
            .filter(|d| d.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn load_document(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
    ) -> StoreResult<Option<BookingDocument>> {
        Ok(self
            .lock()
            .documents
            .iter()
            .find(|d| d.id == document_id && d.booking_id == booking_id)
            .cloned())
    }

    async fn set_document_status(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
        verified_by: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<BookingDocument> {
        let mut state = self.lock();
        let document = state
            .documents
            .iter_mut()
            .find(|d| d.id == document_id && d.booking_id == booking_id)
            .ok_or(StoreError::NotFound("document"))?;
        document.status = status;
        document.verified_at = Some(at);
        document.verified_by = Some(verified_by);
        Ok(document.clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn record(&self, entry: NewAuditEntry) -> StoreResult<AuditLogEntry> {
        let entry = entry.into_entry(Uuid::new_v4(), Utc::now());
        self.lock().audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_for(&self, booking_id: Uuid) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .lock()
            .audit
            .iter()
            .rev()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

fn insert_user(state: &mut State, user: &NewUser) -> StoreResult<User> {
    let taken = state
        .users
        .values()
        .any(|u| u.email.eq_ignore_ascii_case(&user.email));
    if taken || state.users.contains_key(&user.id) {
        return Err(StoreError::Conflict(format!(
            "an account with email {} already exists",
            user.email
        )));
    }
    let stored = User {
        id: user.id,
        email: user.email.clone(),
        password_hash: user.password_hash.clone(),
        full_name: user.full_name.clone(),
        phone: user.phone.clone(),
        created_at: Utc::now(),
    };
    state.users.insert(stored.id, stored.clone());
    Ok(stored)
}

fn insert_role_row(
    state: &mut State,
    user_id: Uuid,
    role: AdminRole,
    created_by: Option<Uuid>,
) -> StoreResult<UserRole> {
    if !state.users.contains_key(&user_id) {
        return Err(StoreError::NotFound("user"));
    }
    if state.roles.contains_key(&user_id) {
        return Err(StoreError::Conflict(format!("user {} already has a role", user_id)));
    }
    let row = UserRole {
        user_id,
        role,
        created_by,
        created_at: Utc::now(),
    };
    state.roles.insert(user_id, row.clone());
    Ok(row)
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        insert_user(&mut self.lock(), user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn search_users(&self, term: Option<&str>, limit: i64) -> StoreResult<Vec<UserWithRole>> {
        let state = self.lock();
        let needle = term.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());

        let mut matches: Vec<&User> = state
            .users
            .values()
            .filter(|u| match &needle {
                Some(n) => {
                    u.email.to_lowercase().contains(n) || u.full_name.to_lowercase().contains(n)
                }
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.email.cmp(&b.email)));

        Ok(matches
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|u| UserWithRole {
                user_id: u.id,
                full_name: u.full_name.clone(),
                email: u.email.clone(),
                role: state.roles.get(&u.id).map(|r| r.role),
            })
            .collect())
    }

    async fn role_of(&self, user_id: Uuid) -> StoreResult<Option<AdminRole>> {
        Ok(self.lock().roles.get(&user_id).map(|r| r.role))
    }

    async fn insert_role(
        &self,
        user_id: Uuid,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<UserRole> {
        insert_role_row(&mut self.lock(), user_id, role, created_by)
    }

    async fn update_role(&self, user_id: Uuid, role: AdminRole) -> StoreResult<UserRole> {
        let mut state = self.lock();
        let row = state
            .roles
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("role"))?;
        row.role = role;
        Ok(row.clone())
    }

    async fn delete_role(&self, user_id: Uuid) -> StoreResult<()> {
        self.lock()
            .roles
            .remove(&user_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("role"))
    }

    async fn count_role(&self, role: AdminRole) -> StoreResult<i64> {
        Ok(self.lock().roles.values().filter(|r| r.role == role).count() as i64)
    }

    async fn create_user_with_role(
        &self,
        user: &NewUser,
        role: AdminRole,
        created_by: Option<Uuid>,
    ) -> StoreResult<(User, UserRole)> {
        let mut state = self.lock();
        let created = insert_user(&mut state, user)?;
        let row = insert_role_row(&mut state, created.id, role, created_by)?;
        Ok((created, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_support::booking_at;
    use bigdecimal::BigDecimal;

    fn user(email: &str, name: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: name.to_string(),
            phone: None,
        }
    }

    fn approve_from(booking: &Booking, number: &str) -> Transition {
        Transition {
            booking_id: booking.id,
            action: crate::workflow::BookingAction::Approve,
            actor_role: AdminRole::SuperAdmin,
            from: booking.status,
            to: BookingStatus::Approved,
            note_field: NoteField::SuperAdmin,
            notes: None,
            effect: SideEffect::Confirmed(number.to_string()),
        }
    }

    fn audit_for(t: &Transition) -> NewAuditEntry {
        crate::audit::AuditTrail::entry_for(t, Uuid::new_v4())
    }

    #[tokio::test]
    async fn duplicate_confirmation_number_is_refused() {
        let store = MemoryStore::new();
        let first = store.seed_booking(booking_at(BookingStatus::FinalApproval));
        let second = store.seed_booking(booking_at(BookingStatus::FinalApproval));

        let t1 = approve_from(&first, "BK-SAME");
        store.commit_transition(&t1, audit_for(&t1)).await.unwrap();

        let t2 = approve_from(&second, "BK-SAME");
        let err = store.commit_transition(&t2, audit_for(&t2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let untouched = store.load_booking(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BookingStatus::FinalApproval);
        assert!(store.list_for(second.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payment_only_once_and_only_while_pending() {
        let store = MemoryStore::new();
        let mut seeded = booking_at(BookingStatus::PaymentPending);
        seeded.advance_amount = Some(BigDecimal::from(5000));
        let booking = store.seed_booking(seeded);

        let paid = store.record_payment(booking.id, Utc::now()).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(paid.payment_date.is_some());
        assert_eq!(paid.status, BookingStatus::PaymentPending);

        let again = store.record_payment(booking.id, Utc::now()).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));

        let early = store.seed_booking(booking_at(BookingStatus::DocumentReview));
        let err = store.record_payment(early.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn customer_edit_is_guarded_by_status() {
        let store = MemoryStore::new();
        let booking = store.seed_booking(booking_at(BookingStatus::ChangeRequested));
        let patch = UpdateCustomerDetails {
            guest_count: Some(150),
            ..Default::default()
        };

        let edited = store
            .update_customer_details(booking.id, BookingStatus::ChangeRequested, &patch)
            .await
            .unwrap();
        assert_eq!(edited.guest_count, Some(150));
        assert_eq!(edited.customer_name, booking.customer_name);

        let err = store
            .update_customer_details(booking.id, BookingStatus::Pending, &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn one_role_per_user() {
        let store = MemoryStore::new();
        let account = store.create_user(&user("a@example.com", "A")).await.unwrap();

        store.insert_role(account.id, AdminRole::Admin1, None).await.unwrap();
        let err = store
            .insert_role(account.id, AdminRole::Admin2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.update_role(account.id, AdminRole::Admin3).await.unwrap();
        assert_eq!(store.role_of(account.id).await.unwrap(), Some(AdminRole::Admin3));
        store.delete_role(account.id).await.unwrap();
        assert!(matches!(
            store.delete_role(account.id).await,
            Err(StoreError::NotFound("role"))
        ));
    }

    #[tokio::test]
    async fn emails_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        store.create_user(&user("Dup@Example.com", "A")).await.unwrap();
        let err = store
            .create_user_with_role(&user("dup@example.com", "B"), AdminRole::Admin1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count_role(AdminRole::Admin1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_matches_name_or_email_and_limits() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store
                .create_user(&user(&format!("guest{i}@example.com"), &format!("Guest {i:02}")))
                .await
                .unwrap();
        }
        let ravi = store.create_user(&user("ravi@venue.in", "Ravi Kumar")).await.unwrap();
        store.insert_role(ravi.id, AdminRole::Admin2, None).await.unwrap();

        assert_eq!(store.search_users(None, 20).await.unwrap().len(), 20);

        let found = store.search_users(Some("KUMAR"), 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Some(AdminRole::Admin2));

        let by_email = store.search_users(Some("venue.in"), 20).await.unwrap();
        assert_eq!(by_email[0].user_id, ravi.id);
    }
}
