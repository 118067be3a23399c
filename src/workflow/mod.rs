//! Booking approval workflow: the single authority on which status changes
//! are legal for which reviewer, and on what else changes with them.

mod confirmation;
mod transitions;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::db::models::audit::AuditLogEntry;
use crate::db::models::booking::{Booking, BookingStatus};
use crate::db::store::{BookingStore, StoreError};
use crate::roles::Caller;

pub use confirmation::ConfirmationGenerator;
pub use transitions::{
    plan_transition, ActionPayload, BookingAction, NoteField, SideEffect, Transition,
};

/// Why an action was refused. Nothing is persisted for any of these.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    /// The booking moved on since the reviewer loaded it.
    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => WorkflowError::NotFound(what),
            StoreError::Conflict(_) => WorkflowError::Conflict(
                "the booking was updated by someone else; please refresh and retry".to_string(),
            ),
            other => WorkflowError::Storage(other),
        }
    }
}

/// ✅ **Reviewer action request (admin dashboard sends this)**
#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct ActionRequest {
    pub action: BookingAction,
    /// Required for `reject` and `request_changes`
    #[serde(default)]
    pub notes: Option<String>,
    /// Only for `request_payment`; must be positive
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub advance_amount: Option<BigDecimal>,
    /// Status the reviewer was looking at; refused as stale when it differs
    #[serde(default)]
    pub expected_status: Option<BookingStatus>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct ActionOutcome {
    pub booking: Booking,
    pub audit_entry: AuditLogEntry,
}

pub struct BookingWorkflow {
    bookings: Arc<dyn BookingStore>,
    confirmations: ConfirmationGenerator,
}

impl BookingWorkflow {
    pub fn new(bookings: Arc<dyn BookingStore>, confirmations: ConfirmationGenerator) -> Self {
        Self {
            bookings,
            confirmations,
        }
    }

    /// Validates `request` against the booking's current status and, when
    /// legal, commits the new status, its side effects and one audit entry.
    ///
    /// The commit compares the persisted status with the one validated here,
    /// so of two reviewers racing on the same booking only the first wins and
    /// the second gets [`WorkflowError::Conflict`].
    pub async fn apply_action(
        &self,
        booking_id: Uuid,
        caller: &Caller,
        request: ActionRequest,
    ) -> Result<ActionOutcome, WorkflowError> {
        let booking = self
            .bookings
            .load_booking(booking_id)
            .await?
            .ok_or(WorkflowError::NotFound("booking"))?;

        if let Some(expected) = request.expected_status {
            if expected != booking.status {
                warn!(
                    %booking_id,
                    %expected,
                    actual = %booking.status,
                    "Stale action refused"
                );
                return Err(WorkflowError::Conflict(format!(
                    "the booking is now {}; please refresh and retry",
                    booking.status.label().to_lowercase()
                )));
            }
        }

        let payload = ActionPayload {
            notes: request.notes,
            advance_amount: request.advance_amount,
        };

        let transition = plan_transition(
            &booking,
            request.action,
            caller.role,
            &payload,
            &self.confirmations,
        )
        .map_err(|e| {
            warn!(
                %booking_id,
                user_id = %caller.user_id,
                action = %request.action,
                status = %booking.status,
                "Booking action refused: {}",
                e
            );
            e
        })?;

        let (booking, audit_entry) = self.commit(transition.clone(), caller.user_id).await?;

        info!(
            %booking_id,
            user_id = %caller.user_id,
            role = %transition.actor_role,
            from = %transition.from,
            to = %transition.to,
            "✅ Booking transition committed"
        );

        Ok(ActionOutcome {
            booking,
            audit_entry,
        })
    }

    /// Commits `transition` with its audit entry.
    ///
    /// A conflict on a confirming commit is either a lost status race or a
    /// confirmation number that is already taken. The booking is re-read to
    /// tell them apart; a taken number is redrawn once.
    async fn commit(
        &self,
        mut transition: Transition,
        actor_id: Uuid,
    ) -> Result<(Booking, AuditLogEntry), WorkflowError> {
        let mut redrawn = false;
        loop {
            let entry = AuditTrail::entry_for(&transition, actor_id);
            let reason = match self.bookings.commit_transition(&transition, entry).await {
                Ok(committed) => return Ok(committed),
                Err(StoreError::Conflict(reason))
                    if matches!(transition.effect, SideEffect::Confirmed(_)) =>
                {
                    reason
                }
                Err(e) => return Err(e.into()),
            };

            if !self.still_at(&transition).await? {
                return Err(StoreError::Conflict(reason).into());
            }
            warn!(
                booking_id = %transition.booking_id,
                "Confirmation number collided: {}",
                reason
            );
            if redrawn {
                return Err(WorkflowError::Conflict(
                    "a unique confirmation number could not be issued; please retry the approval"
                        .to_string(),
                ));
            }
            redrawn = true;
            transition.effect = SideEffect::Confirmed(self.confirmations.next());
        }
    }

    async fn still_at(&self, transition: &Transition) -> Result<bool, WorkflowError> {
        Ok(self
            .bookings
            .load_booking(transition.booking_id)
            .await?
            .is_some_and(|b| b.status == transition.from))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use bigdecimal::BigDecimal;
    use chrono::{Duration, NaiveTime, Utc};
    use uuid::Uuid;

    use crate::db::models::booking::{Booking, BookingStatus, PaymentStatus};

    pub fn booking_at(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            booking_date: Utc::now().date_naive() + Duration::days(30),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            hall_ids: vec![Uuid::new_v4()],
            status,
            total_amount: BigDecimal::from(20000),
            notes: None,
            customer_name: "Asha Rao".to_string(),
            customer_email: "asha@example.com".to_string(),
            customer_phone: None,
            event_type: Some("wedding".to_string()),
            guest_count: Some(200),
            special_requests: None,
            admin1_notes: None,
            admin2_notes: None,
            super_admin_notes: None,
            payment_status: PaymentStatus::Unpaid,
            payment_date: None,
            advance_amount: None,
            confirmation_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}
