use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::db::models::booking::{Booking, BookingDraft, BookingStatus, UpdateCustomerDetails};
use crate::workflow::{SideEffect, Transition};

/// Booking columns plus the aggregated hall ids from `booking_halls`.
const BOOKING_SELECT: &str = r#"
    SELECT
        b.id, b.user_id, b.booking_date, b.start_time, b.end_time,
        COALESCE(
            (SELECT array_agg(bh.hall_id ORDER BY bh.created_at, bh.hall_id)
               FROM booking_halls bh
              WHERE bh.booking_id = b.id),
            '{}'::uuid[]
        ) AS hall_ids,
        b.status, b.total_amount, b.notes,
        b.customer_name, b.customer_email, b.customer_phone,
        b.event_type, b.guest_count, b.special_requests,
        b.admin1_notes, b.admin2_notes, b.super_admin_notes,
        b.payment_status, b.payment_date, b.advance_amount,
        b.confirmation_number, b.created_at, b.updated_at
    FROM bookings b
"#;

macro_rules! push_if_some {
    ($separated:ident, $update:ident, $field:ident) => {
        if let Some(value) = &$update.$field {
            $separated
                .push(concat!(stringify!($field), " = "))
                .push_bind_unseparated(value);
        }
    };
}

pub async fn get_booking<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!("{BOOKING_SELECT} WHERE b.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_bookings<'e>(
    executor: impl PgExecutor<'e>,
    status: Option<BookingStatus>,
) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!(
        "{BOOKING_SELECT} WHERE ($1::booking_status IS NULL OR b.status = $1) ORDER BY b.created_at DESC"
    ))
    .bind(status)
    .fetch_all(executor)
    .await
}

pub async fn bookings_for_owner<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(&format!(
        "{BOOKING_SELECT} WHERE b.user_id = $1 ORDER BY b.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Inserts the booking row and its hall links; the caller owns the transaction.
pub async fn insert_booking(
    tx: &mut Transaction<'_, Postgres>,
    draft: &BookingDraft,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, user_id, booking_date, start_time, end_time, status, total_amount,
            notes, customer_name, customer_email, customer_phone, event_type,
            guest_count, special_requests, payment_status
        ) VALUES (
            $1, $2, $3, $4, $5, 'pending', $6, $7, $8, $9, $10, $11, $12, $13, 'unpaid'
        )
        "#,
    )
    .bind(draft.id)
    .bind(draft.user_id)
    .bind(draft.booking_date)
    .bind(draft.start_time)
    .bind(draft.end_time)
    .bind(&draft.total_amount)
    .bind(&draft.notes)
    .bind(&draft.customer_name)
    .bind(&draft.customer_email)
    .bind(&draft.customer_phone)
    .bind(&draft.event_type)
    .bind(draft.guest_count)
    .bind(&draft.special_requests)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO booking_halls (booking_id, hall_id) SELECT $1, UNNEST($2::uuid[])",
    )
    .bind(draft.id)
    .bind(&draft.hall_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Patches customer fields while the status still equals `expected`.
/// Returns whether a row was updated.
pub async fn update_customer_details<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    expected: BookingStatus,
    update: &UpdateCustomerDetails,
) -> Result<bool, sqlx::Error> {
    let mut query_builder = QueryBuilder::<Postgres>::new("UPDATE bookings SET ");
    let mut separated = query_builder.separated(", ");

    push_if_some!(separated, update, customer_name);
    push_if_some!(separated, update, customer_email);
    push_if_some!(separated, update, customer_phone);
    push_if_some!(separated, update, event_type);
    push_if_some!(separated, update, guest_count);
    push_if_some!(separated, update, special_requests);
    push_if_some!(separated, update, notes);

    separated.push("updated_at = NOW()");
    query_builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" AND status = ")
        .push_bind(expected);

    let result = query_builder.build().execute(executor).await?;
    Ok(result.rows_affected() == 1)
}

/// Status compare-and-swap carrying the transition's notes and side effect.
/// Returns whether the row still had `transition.from` and was updated.
pub async fn apply_transition(
    tx: &mut Transaction<'_, Postgres>,
    transition: &Transition,
) -> Result<bool, sqlx::Error> {
    let mut query_builder = QueryBuilder::<Postgres>::new("UPDATE bookings SET status = ");
    query_builder.push_bind(transition.to);

    // Column name comes from a closed enum, never from input.
    query_builder
        .push(", ")
        .push(transition.note_field.column())
        .push(" = ")
        .push_bind(transition.notes.clone());

    match &transition.effect {
        SideEffect::None => {}
        SideEffect::AdvanceRequested(amount) => {
            query_builder.push(", advance_amount = ").push_bind(amount.clone());
        }
        SideEffect::Confirmed(number) => {
            query_builder
                .push(", confirmation_number = ")
                .push_bind(number.clone());
        }
    }

    query_builder
        .push(", updated_at = NOW() WHERE id = ")
        .push_bind(transition.booking_id)
        .push(" AND status = ")
        .push_bind(transition.from);

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected() == 1)
}

/// Marks an unpaid `payment_pending` booking as paid.
pub async fn mark_paid<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    paid_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
           SET payment_status = 'paid', payment_date = $2, updated_at = NOW()
         WHERE id = $1 AND status = 'payment_pending' AND payment_status = 'unpaid'
        "#,
    )
    .bind(id)
    .bind(paid_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn booking_exists<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1)")
        .bind(id)
        .fetch_one(executor)
        .await
}
