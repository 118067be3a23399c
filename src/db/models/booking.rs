use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Position of a booking in the approval chain.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Submitted, awaiting the Admin1 document check
    Pending,
    /// Sent back to the customer for corrections
    ChangeRequested,
    /// Documents approved, awaiting Admin2
    DocumentReview,
    AvailabilityCheck,
    /// Admin2 asked for the advance payment
    PaymentPending,
    PaymentCompleted,
    /// Awaiting Admin3 / SuperAdmin sign-off
    FinalApproval,
    Approved,
    Rejected,
}

impl BookingStatus {
    #[cfg(test)]
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Pending,
        BookingStatus::ChangeRequested,
        BookingStatus::DocumentReview,
        BookingStatus::AvailabilityCheck,
        BookingStatus::PaymentPending,
        BookingStatus::PaymentCompleted,
        BookingStatus::FinalApproval,
        BookingStatus::Approved,
        BookingStatus::Rejected,
    ];

    /// `approved` and `rejected` absorb every further action.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Approved | BookingStatus::Rejected)
    }

    /// Statuses in which the customer still owns the booking's own fields
    /// and may upload documents.
    pub fn is_customer_editable(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::ChangeRequested)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::ChangeRequested => "change_requested",
            BookingStatus::DocumentReview => "document_review",
            BookingStatus::AvailabilityCheck => "availability_check",
            BookingStatus::PaymentPending => "payment_pending",
            BookingStatus::PaymentCompleted => "payment_completed",
            BookingStatus::FinalApproval => "final_approval",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Human readable label shown to customers and reviewers.
    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Documents Verification Pending",
            BookingStatus::ChangeRequested => "Changes Requested",
            BookingStatus::DocumentReview => "Pending Admin2 Review",
            BookingStatus::AvailabilityCheck => "Checking Availability",
            BookingStatus::PaymentPending => "Payment Pending",
            BookingStatus::PaymentCompleted => "Payment Completed",
            BookingStatus::FinalApproval => "Pending Final Approval",
            BookingStatus::Approved => "Approved",
            BookingStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

/// ✅ **Booking row as stored in PostgreSQL**
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    /// Customer who created the booking
    pub user_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Venues selected for this booking (from `booking_halls`)
    pub hall_ids: Vec<Uuid>,
    pub status: BookingStatus,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    pub notes: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub event_type: Option<String>,
    pub guest_count: Option<i32>,
    pub special_requests: Option<String>,
    pub admin1_notes: Option<String>,
    pub admin2_notes: Option<String>,
    pub super_admin_notes: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub advance_amount: Option<BigDecimal>,
    /// Present if and only if `status == approved`
    pub confirmation_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ✅ **New Booking Request (customer sends this)**
#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct NewBooking {
    pub hall_ids: Vec<Uuid>,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub event_type: Option<String>,
    pub guest_count: Option<i32>,
    pub special_requests: Option<String>,
    pub notes: Option<String>,
}

/// Validated booking ready to be inserted, total already priced.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hall_ids: Vec<Uuid>,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_amount: BigDecimal,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub event_type: Option<String>,
    pub guest_count: Option<i32>,
    pub special_requests: Option<String>,
    pub notes: Option<String>,
}

/// ✅ **Customer-owned fields editable before review starts**
#[derive(Debug, Deserialize, Clone, Default, ToSchema)]
pub struct UpdateCustomerDetails {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub event_type: Option<String>,
    pub guest_count: Option<i32>,
    pub special_requests: Option<String>,
    pub notes: Option<String>,
}

impl UpdateCustomerDetails {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.customer_email.is_none()
            && self.customer_phone.is_none()
            && self.event_type.is_none()
            && self.guest_count.is_none()
            && self.special_requests.is_none()
            && self.notes.is_none()
    }
}

/// Payment confirmation sent by the payment UI.
#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct PaymentConfirmation {
    #[schema(value_type = String)]
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize, Default)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
}
