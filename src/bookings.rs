//! Customer-facing booking operations: creation and pricing, visibility,
//! detail edits before review, the payment confirmation event and identity
//! documents. Status changes by reviewers go through [`crate::workflow`].

use std::collections::HashSet;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::booking::{
    Booking, BookingDraft, BookingStatus, NewBooking, PaymentConfirmation, PaymentStatus,
    UpdateCustomerDetails,
};
use crate::db::models::document::{BookingDocument, DocumentStatus, DocumentType, NewDocument};
use crate::db::models::hall::BanquetHall;
use crate::db::models::role::AdminRole;
use crate::db::store::{BookingStore, StoreError};
use crate::roles::Caller;
use crate::workflow::WorkflowError;

/// Roles allowed to verify identity documents.
const DOCUMENT_REVIEWERS: [AdminRole; 2] = [AdminRole::Admin1, AdminRole::SuperAdmin];

/// Σ hourly rate × booked minutes / 60, rounded to cents.
pub fn price_booking(halls: &[BanquetHall], start: NaiveTime, end: NaiveTime) -> BigDecimal {
    let minutes = BigDecimal::from((end - start).num_minutes());
    let hourly: BigDecimal = halls.iter().map(|h| h.price_per_hour.clone()).sum();
    (hourly * minutes / BigDecimal::from(60)).round(2)
}

fn required(value: &str, field: &str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    trust_client_payments: bool,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingStore>, trust_client_payments: bool) -> Self {
        Self {
            bookings,
            trust_client_payments,
        }
    }

    /// Validates and prices a new booking for `caller`. It starts `pending`
    /// and unpaid.
    pub async fn create(
        &self,
        caller: &Caller,
        request: NewBooking,
        today: NaiveDate,
    ) -> Result<Booking, WorkflowError> {
        let mut seen = HashSet::new();
        let hall_ids: Vec<Uuid> = request
            .hall_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if hall_ids.is_empty() {
            return Err(WorkflowError::Validation(
                "select at least one hall".to_string(),
            ));
        }
        if request.end_time <= request.start_time {
            return Err(WorkflowError::Validation(
                "end time must be after start time".to_string(),
            ));
        }
        if request.booking_date < today {
            return Err(WorkflowError::Validation(
                "the booking date cannot be in the past".to_string(),
            ));
        }
        let customer_name = required(&request.customer_name, "customer name")?;
        let customer_email = required(&request.customer_email, "customer email")?;
        if !customer_email.contains('@') {
            return Err(WorkflowError::Validation(format!(
                "'{}' is not a valid email",
                customer_email
            )));
        }
        if matches!(request.guest_count, Some(n) if n <= 0) {
            return Err(WorkflowError::Validation(
                "guest count must be positive".to_string(),
            ));
        }

        let mut halls = Vec::with_capacity(hall_ids.len());
        for id in &hall_ids {
            match self.bookings.get_hall(*id).await? {
                Some(hall) if hall.is_active => halls.push(hall),
                Some(hall) => {
                    return Err(WorkflowError::Validation(format!(
                        "{} is not available for booking",
                        hall.name
                    )))
                }
                None => return Err(WorkflowError::Validation(format!("hall {} does not exist", id))),
            }
        }

        if let Some(guests) = request.guest_count {
            let capacity: i64 = halls.iter().map(|h| i64::from(h.capacity)).sum();
            if i64::from(guests) > capacity {
                return Err(WorkflowError::Validation(format!(
                    "{} guests exceed the combined capacity of {}",
                    guests, capacity
                )));
            }
        }

        let draft = BookingDraft {
            id: Uuid::new_v4(),
            user_id: caller.user_id,
            total_amount: price_booking(&halls, request.start_time, request.end_time),
            hall_ids,
            booking_date: request.booking_date,
            start_time: request.start_time,
            end_time: request.end_time,
            customer_name,
            customer_email,
            customer_phone: non_blank(request.customer_phone),
            event_type: non_blank(request.event_type),
            guest_count: request.guest_count,
            special_requests: non_blank(request.special_requests),
            notes: non_blank(request.notes),
        };

        let booking = self.bookings.create_booking(&draft).await?;
        info!(booking_id = %booking.id, user_id = %caller.user_id, total = %booking.total_amount, "✅ Booking created");
        Ok(booking)
    }

    /// The booking if `caller` owns it or holds any admin role. Others get
    /// `NotFound` so bookings can't be enumerated.
    pub async fn visible_to(&self, caller: &Caller, id: Uuid) -> Result<Booking, WorkflowError> {
        match self.bookings.load_booking(id).await? {
            Some(b) if caller.is_admin() || b.user_id == caller.user_id => Ok(b),
            _ => Err(WorkflowError::NotFound("booking")),
        }
    }

    async fn owned_by(&self, caller: &Caller, id: Uuid) -> Result<Booking, WorkflowError> {
        match self.bookings.load_booking(id).await? {
            Some(b) if b.user_id == caller.user_id => Ok(b),
            Some(_) if caller.is_admin() => Err(WorkflowError::Unauthorized(
                "only the customer who made the booking can do this".to_string(),
            )),
            _ => Err(WorkflowError::NotFound("booking")),
        }
    }

    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Booking>, WorkflowError> {
        Ok(self.bookings.bookings_for_owner(caller.user_id).await?)
    }

    /// Reviewer queue, newest first.
    pub async fn queue(
        &self,
        caller: &Caller,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, WorkflowError> {
        if !caller.is_admin() {
            return Err(WorkflowError::Unauthorized(
                "an admin role is required to list bookings".to_string(),
            ));
        }
        Ok(self.bookings.list_bookings(status).await?)
    }

    /// Edits customer-owned fields while the booking is still with the customer.
    pub async fn update_details(
        &self,
        caller: &Caller,
        id: Uuid,
        mut patch: UpdateCustomerDetails,
    ) -> Result<Booking, WorkflowError> {
        let booking = self.owned_by(caller, id).await?;
        if !booking.status.is_customer_editable() {
            return Err(WorkflowError::Conflict(format!(
                "a booking that is {} can no longer be edited",
                booking.status.label().to_lowercase()
            )));
        }
        if let Some(name) = &patch.customer_name {
            patch.customer_name = Some(required(name, "customer name")?);
        }
        if let Some(email) = &patch.customer_email {
            let email = required(email, "customer email")?;
            if !email.contains('@') {
                return Err(WorkflowError::Validation(format!("'{}' is not a valid email", email)));
            }
            patch.customer_email = Some(email);
        }
        if matches!(patch.guest_count, Some(n) if n <= 0) {
            return Err(WorkflowError::Validation(
                "guest count must be positive".to_string(),
            ));
        }
        if patch.is_empty() {
            return Ok(booking);
        }

        Ok(self
            .bookings
            .update_customer_details(id, booking.status, &patch)
            .await?)
    }

    /// Records the customer's advance payment. The status stays
    /// `payment_pending` until admin2 forwards the booking.
    pub async fn confirm_payment(
        &self,
        caller: &Caller,
        id: Uuid,
        payment: PaymentConfirmation,
    ) -> Result<Booking, WorkflowError> {
        if !self.trust_client_payments {
            warn!(booking_id = %id, "Client payment confirmation refused: trust disabled");
            return Err(WorkflowError::Unauthorized(
                "payments must be confirmed by the payment provider".to_string(),
            ));
        }

        let booking = self.owned_by(caller, id).await?;
        if booking.status != BookingStatus::PaymentPending {
            return Err(WorkflowError::Validation(
                "this booking is not awaiting payment".to_string(),
            ));
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(WorkflowError::Conflict(
                "the advance has already been paid".to_string(),
            ));
        }
        if payment.amount <= BigDecimal::from(0) {
            return Err(WorkflowError::Validation(
                "the payment amount must be greater than zero".to_string(),
            ));
        }
        if let Some(advance) = &booking.advance_amount {
            if payment.amount < *advance {
                return Err(WorkflowError::Validation(format!(
                    "the payment must cover the requested advance of {}",
                    advance
                )));
            }
        }

        let paid = self
            .bookings
            .record_payment(id, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => WorkflowError::Conflict(
                    "the booking changed while the payment was being recorded; please refresh"
                        .to_string(),
                ),
                other => other.into(),
            })?;
        info!(booking_id = %id, amount = %payment.amount, "✅ Advance payment recorded");
        Ok(paid)
    }

    /// Checks that `caller` may attach a document to booking `id` right now.
    pub async fn authorize_upload(&self, caller: &Caller, id: Uuid) -> Result<Booking, WorkflowError> {
        let booking = self.owned_by(caller, id).await?;
        if !booking.status.is_customer_editable() {
            return Err(WorkflowError::Conflict(format!(
                "documents cannot be added to a booking that is {}",
                booking.status.label().to_lowercase()
            )));
        }
        Ok(booking)
    }

    pub async fn attach_document(
        &self,
        booking_id: Uuid,
        document_id: Uuid,
        document_type: DocumentType,
        document_name: String,
        file_url: String,
    ) -> Result<BookingDocument, WorkflowError> {
        let document = self
            .bookings
            .add_document(&NewDocument {
                id: document_id,
                booking_id,
                document_type,
                document_name,
                file_url,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => WorkflowError::Conflict(
                    "the booking moved on while the document was uploading; it no longer accepts documents"
                        .to_string(),
                ),
                other => other.into(),
            })?;
        info!(%booking_id, document_id = %document.id, "✅ Document uploaded");
        Ok(document)
    }

    pub async fn documents(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> Result<Vec<BookingDocument>, WorkflowError> {
        self.visible_to(caller, id).await?;
        Ok(self.bookings.list_documents(id).await?)
    }

    pub async fn document(
        &self,
        caller: &Caller,
        id: Uuid,
        document_id: Uuid,
    ) -> Result<BookingDocument, WorkflowError> {
        self.visible_to(caller, id).await?;
        self.bookings
            .load_document(id, document_id)
            .await?
            .ok_or(WorkflowError::NotFound("document"))
    }

    /// Admin1 or super_admin verdict on a document. Never changes the
    /// booking's status.
    pub async fn verify_document(
        &self,
        caller: &Caller,
        id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<BookingDocument, WorkflowError> {
        if !caller.has_role(&DOCUMENT_REVIEWERS) {
            return Err(WorkflowError::Unauthorized(
                "only admin1 or super_admin can verify documents".to_string(),
            ));
        }
        if status == DocumentStatus::Pending {
            return Err(WorkflowError::Validation(
                "a document can only be marked verified or rejected".to_string(),
            ));
        }
        self.visible_to(caller, id).await?;

        let document = self
            .bookings
            .set_document_status(id, document_id, status, caller.user_id, Utc::now())
            .await?;
        info!(booking_id = %id, %document_id, status = ?status, "✅ Document reviewed");
        Ok(document)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{hall, new_booking};
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::workflow::test_support::booking_at;
    use crate::workflow::{ActionRequest, BookingAction, BookingWorkflow, ConfirmationGenerator};
    use std::str::FromStr;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn service(store: &Arc<MemoryStore>) -> BookingService {
        BookingService::new(store.clone(), true)
    }

    fn reviewer(role: AdminRole) -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            role: Some(role),
        }
    }

    #[test]
    fn price_sums_halls_over_duration() {
        let halls = [hall("Grand", 5000, 300), hall("Lawn", 3000, 200)];
        let total = price_booking(
            &halls,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 45, 0).unwrap(),
        );
        assert_eq!(total, BigDecimal::from(22000));

        let odd = [hall("Annex", 1000, 50)];
        let total = price_booking(
            &odd,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 20, 0).unwrap(),
        );
        assert_eq!(total, BigDecimal::from_str("333.33").unwrap());
    }

    #[tokio::test]
    async fn create_prices_and_starts_pending() {
        let store = Arc::new(MemoryStore::new());
        let grand = store.insert_hall(hall("Grand", 5000, 300));
        let customer = Caller::customer(Uuid::new_v4());

        let booking = service(&store)
            .create(&customer, new_booking(vec![grand.id, grand.id]), today())
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        assert_eq!(booking.hall_ids, vec![grand.id]);
        assert_eq!(booking.total_amount, BigDecimal::from(22500));
        assert_eq!(booking.customer_phone, None);
        assert_eq!(booking.confirmation_number, None);
        assert_eq!(booking.user_id, customer.user_id);
    }

    #[tokio::test]
    async fn create_rejects_bad_requests() {
        let store = Arc::new(MemoryStore::new());
        let grand = store.insert_hall(hall("Grand", 5000, 100));
        let mut closed = hall("Closed", 1000, 100);
        closed.is_active = false;
        let closed = store.insert_hall(closed);
        let customer = Caller::customer(Uuid::new_v4());
        let svc = service(&store);

        let mut cases = Vec::new();
        cases.push(new_booking(vec![]));
        cases.push(new_booking(vec![closed.id]));
        cases.push(new_booking(vec![Uuid::new_v4()]));
        let mut backwards = new_booking(vec![grand.id]);
        backwards.end_time = backwards.start_time;
        cases.push(backwards);
        let mut past = new_booking(vec![grand.id]);
        past.booking_date = today().pred_opt().unwrap();
        cases.push(past);
        let mut nameless = new_booking(vec![grand.id]);
        nameless.customer_name = "  ".to_string();
        cases.push(nameless);
        let mut crowded = new_booking(vec![grand.id]);
        crowded.guest_count = Some(101);
        cases.push(crowded);

        for request in cases {
            let err = svc.create(&customer, request, today()).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)), "{err}");
        }
        assert!(store.list_bookings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strangers_cannot_see_bookings() {
        let store = Arc::new(MemoryStore::new());
        let booking = store.seed_booking(booking_at(BookingStatus::Pending));
        let svc = service(&store);

        let owner = Caller::customer(booking.user_id);
        assert!(svc.visible_to(&owner, booking.id).await.is_ok());
        assert!(svc.visible_to(&reviewer(AdminRole::Admin2), booking.id).await.is_ok());

        let stranger = Caller::customer(Uuid::new_v4());
        let err = svc.visible_to(&stranger, booking.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound("booking")));

        let err = svc.queue(&stranger, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn edits_only_before_review() {
        let store = Arc::new(MemoryStore::new());
        let open = store.seed_booking(booking_at(BookingStatus::ChangeRequested));
        let locked = store.seed_booking(booking_at(BookingStatus::DocumentReview));
        let svc = service(&store);
        let patch = UpdateCustomerDetails {
            special_requests: Some("vegetarian menu".to_string()),
            ..Default::default()
        };

        let edited = svc
            .update_details(&Caller::customer(open.user_id), open.id, patch.clone())
            .await
            .unwrap();
        assert_eq!(edited.special_requests.as_deref(), Some("vegetarian menu"));
        assert_eq!(edited.status, BookingStatus::ChangeRequested);

        let err = svc
            .update_details(&Caller::customer(locked.user_id), locked.id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn payment_rules() {
        let store = Arc::new(MemoryStore::new());
        let mut seeded = booking_at(BookingStatus::PaymentPending);
        seeded.advance_amount = Some(BigDecimal::from(5000));
        let booking = store.seed_booking(seeded);
        let owner = Caller::customer(booking.user_id);
        let svc = service(&store);
        let pay = |amount: i64| PaymentConfirmation {
            amount: BigDecimal::from(amount),
        };

        let err = svc.confirm_payment(&owner, booking.id, pay(4999)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        let err = svc.confirm_payment(&owner, booking.id, pay(0)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err = svc
            .confirm_payment(&reviewer(AdminRole::Admin2), booking.id, pay(5000))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));

        let paid = svc.confirm_payment(&owner, booking.id, pay(5000)).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, BookingStatus::PaymentPending);

        let err = svc.confirm_payment(&owner, booking.id, pay(5000)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn untrusted_payments_are_refused() {
        let store = Arc::new(MemoryStore::new());
        let booking = store.seed_booking(booking_at(BookingStatus::PaymentPending));
        let svc = BookingService::new(store.clone(), false);

        let err = svc
            .confirm_payment(
                &Caller::customer(booking.user_id),
                booking.id,
                PaymentConfirmation {
                    amount: BigDecimal::from(100),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
        let reread = store.load_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(reread.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn document_review_does_not_move_status() {
        let store = Arc::new(MemoryStore::new());
        let booking = store.seed_booking(booking_at(BookingStatus::Pending));
        let svc = service(&store);
        let owner = Caller::customer(booking.user_id);

        svc.authorize_upload(&owner, booking.id).await.unwrap();
        let doc_id = Uuid::new_v4();
        svc.attach_document(
            booking.id,
            doc_id,
            DocumentType::Passport,
            "passport.pdf".to_string(),
            format!("/bookings/{}/documents/{}/file", booking.id, doc_id),
        )
        .await
        .unwrap();

        let err = svc
            .verify_document(&reviewer(AdminRole::Admin2), booking.id, doc_id, DocumentStatus::Verified)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));

        let admin1 = reviewer(AdminRole::Admin1);
        let doc = svc
            .verify_document(&admin1, booking.id, doc_id, DocumentStatus::Verified)
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Verified);
        assert_eq!(doc.verified_by, Some(admin1.user_id));

        let reread = store.load_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(reread.status, BookingStatus::Pending);
        assert_eq!(svc.documents(&owner, booking.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_racing_an_approval_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let booking = store.seed_booking(booking_at(BookingStatus::Pending));
        let svc = service(&store);
        let owner = Caller::customer(booking.user_id);

        svc.authorize_upload(&owner, booking.id).await.unwrap();

        let workflow = BookingWorkflow::new(store.clone(), ConfirmationGenerator::default());
        workflow
            .apply_action(
                booking.id,
                &reviewer(AdminRole::Admin1),
                ActionRequest {
                    action: BookingAction::Approve,
                    notes: None,
                    advance_amount: None,
                    expected_status: None,
                },
            )
            .await
            .unwrap();

        let doc_id = Uuid::new_v4();
        let err = svc
            .attach_document(
                booking.id,
                doc_id,
                DocumentType::Aadhaar,
                "aadhaar.jpg".to_string(),
                format!("/bookings/{}/documents/{}/file", booking.id, doc_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)), "{err}");

        assert!(svc.documents(&owner, booking.id).await.unwrap().is_empty());
        let reread = store.load_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(reread.status, BookingStatus::DocumentReview);
    }

    #[tokio::test]
    async fn uploads_close_once_review_starts() {
        let store = Arc::new(MemoryStore::new());
        let booking = store.seed_booking(booking_at(BookingStatus::FinalApproval));
        let err = service(&store)
            .authorize_upload(&Caller::customer(booking.user_id), booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }
}
