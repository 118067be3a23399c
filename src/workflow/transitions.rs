//! Legal transition table of the booking approval chain.
//!
//! Everything here is pure: given the booking as loaded, the acting role and
//! the reviewer's payload it either produces the complete [`Transition`] to
//! persist or a typed rejection. Nothing is written until the caller commits.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::booking::{Booking, BookingStatus, PaymentStatus};
use crate::db::models::role::AdminRole;

use super::confirmation::ConfirmationGenerator;
use super::WorkflowError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Approve,
    Reject,
    RequestChanges,
    RequestPayment,
    #[serde(alias = "forward_admin3")]
    ForwardToAdmin3,
}

impl BookingAction {
    #[cfg(test)]
    pub const ALL: [BookingAction; 5] = [
        BookingAction::Approve,
        BookingAction::Reject,
        BookingAction::RequestChanges,
        BookingAction::RequestPayment,
        BookingAction::ForwardToAdmin3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingAction::Approve => "approve",
            BookingAction::Reject => "reject",
            BookingAction::RequestChanges => "request_changes",
            BookingAction::RequestPayment => "request_payment",
            BookingAction::ForwardToAdmin3 => "forward_to_admin3",
        }
    }
}

impl std::fmt::Display for BookingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer input accompanying an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPayload {
    pub notes: Option<String>,
    pub advance_amount: Option<BigDecimal>,
}

/// Which reviewer note column an action overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Admin1,
    Admin2,
    /// Shared by admin3 and super_admin
    SuperAdmin,
}

impl NoteField {
    pub fn for_role(role: AdminRole) -> Self {
        match role {
            AdminRole::Admin1 => NoteField::Admin1,
            AdminRole::Admin2 => NoteField::Admin2,
            AdminRole::Admin3 | AdminRole::SuperAdmin => NoteField::SuperAdmin,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            NoteField::Admin1 => "admin1_notes",
            NoteField::Admin2 => "admin2_notes",
            NoteField::SuperAdmin => "super_admin_notes",
        }
    }
}

/// The only booking fields a transition may touch beyond status and notes.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    None,
    AdvanceRequested(BigDecimal),
    Confirmed(String),
}

/// A validated status change, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub booking_id: Uuid,
    pub action: BookingAction,
    pub actor_role: AdminRole,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub note_field: NoteField,
    /// Trimmed notes; `None` when the reviewer left them blank
    pub notes: Option<String>,
    pub effect: SideEffect,
}

impl Transition {
    /// Label written to the audit trail.
    pub fn label(&self) -> &'static str {
        match (self.action, self.to) {
            (BookingAction::Approve, BookingStatus::Approved)
                if self.from != BookingStatus::FinalApproval =>
            {
                "Approved (SuperAdmin Override)"
            }
            (BookingAction::Approve, BookingStatus::Approved) => "Booking Approved",
            (BookingAction::Approve, _) => "Documents Approved",
            (BookingAction::Reject, _) => "Booking Rejected",
            (BookingAction::RequestChanges, _) => "Changes Requested",
            (BookingAction::RequestPayment, _) => "Payment Requested",
            (BookingAction::ForwardToAdmin3, _) => "Forwarded to Admin3",
        }
    }
}

/// Resulting status for `(role, current status, action)`, or `None` when the
/// combination is not in the table.
pub fn next_status(
    role: AdminRole,
    status: BookingStatus,
    action: BookingAction,
) -> Option<BookingStatus> {
    use AdminRole::*;
    use BookingAction::*;
    use BookingStatus as S;

    match (role, status, action) {
        (Admin1, S::Pending, Approve) => Some(S::DocumentReview),
        (Admin1, S::Pending, RequestChanges) => Some(S::ChangeRequested),
        (Admin1, S::Pending, Reject) => Some(S::Rejected),

        (Admin2, S::DocumentReview, RequestPayment) => Some(S::PaymentPending),
        (Admin2, S::DocumentReview, Reject) => Some(S::Rejected),
        (Admin2, S::PaymentPending, ForwardToAdmin3) => Some(S::FinalApproval),

        (Admin3 | SuperAdmin, S::FinalApproval, Approve) => Some(S::Approved),
        (Admin3 | SuperAdmin, S::FinalApproval, Reject) => Some(S::Rejected),

        // Override path
        (SuperAdmin, s, Approve) if !s.is_terminal() => Some(S::Approved),

        _ => None,
    }
}

/// Validates an action against the booking as loaded and builds the
/// transition to commit.
///
/// Checks run in order: caller role, transition table, payment precondition,
/// then payload. A confirmation number is drawn from `confirmations` only
/// when the result is `approved` and the booking does not already carry one.
pub fn plan_transition(
    booking: &Booking,
    action: BookingAction,
    role: Option<AdminRole>,
    payload: &ActionPayload,
    confirmations: &ConfirmationGenerator,
) -> Result<Transition, WorkflowError> {
    let role = role.ok_or_else(|| {
        WorkflowError::Unauthorized("an admin role is required to act on bookings".to_string())
    })?;

    let to = next_status(role, booking.status, action).ok_or_else(|| {
        WorkflowError::Unauthorized(format!(
            "{} cannot {} a booking that is {}",
            role,
            action,
            booking.status.label().to_lowercase()
        ))
    })?;

    if action == BookingAction::ForwardToAdmin3 && booking.payment_status != PaymentStatus::Paid {
        return Err(WorkflowError::Unauthorized(
            "the advance payment has not been received yet".to_string(),
        ));
    }

    let notes = payload
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    match action {
        BookingAction::Reject if notes.is_none() => {
            return Err(WorkflowError::Validation(
                "notes are required to reject a booking".to_string(),
            ));
        }
        BookingAction::RequestChanges if notes.is_none() => {
            return Err(WorkflowError::Validation(
                "notes are required to request changes".to_string(),
            ));
        }
        _ => {}
    }

    let effect = match action {
        BookingAction::RequestPayment => {
            let amount = payload.advance_amount.clone().ok_or_else(|| {
                WorkflowError::Validation(
                    "an advance amount is required to request payment".to_string(),
                )
            })?;
            if amount <= BigDecimal::from(0) {
                return Err(WorkflowError::Validation(
                    "the advance amount must be greater than zero".to_string(),
                ));
            }
            if amount > booking.total_amount {
                return Err(WorkflowError::Validation(format!(
                    "the advance amount cannot exceed the booking total of {}",
                    booking.total_amount
                )));
            }
            SideEffect::AdvanceRequested(amount)
        }
        _ if payload.advance_amount.is_some() => {
            return Err(WorkflowError::Validation(
                "an advance amount is only accepted when requesting payment".to_string(),
            ));
        }
        _ if to == BookingStatus::Approved && booking.confirmation_number.is_none() => {
            SideEffect::Confirmed(confirmations.next())
        }
        _ => SideEffect::None,
    };

    Ok(Transition {
        booking_id: booking.id,
        action,
        actor_role: role,
        from: booking.status,
        to,
        note_field: NoteField::for_role(role),
        notes,
        effect,
    })
}
