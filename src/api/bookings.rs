use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::audit::AuditLogEntry;
use crate::db::models::booking::{
    Booking, BookingQuery, BookingStatus, NewBooking, PaymentConfirmation, PaymentStatus,
    UpdateCustomerDetails,
};
use crate::roles::Caller;
use crate::utils::api_response::ApiResponse;
use crate::workflow::{ActionOutcome, ActionRequest, BookingAction};

/// ✅ Create a booking for the caller
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "Bookings",
    request_body = NewBooking,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Invalid booking request"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<NewBooking>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = state
        .bookings
        .create(&caller, payload, Utc::now().date_naive())
        .await?;
    Ok(ApiResponse::success(StatusCode::CREATED, "Booking created", booking))
}

/// The caller's own bookings, newest first.
#[utoipa::path(
    get,
    path = "/bookings/mine",
    tag = "Bookings",
    responses(
        (status = 200, description = "Bookings retrieved", body = Vec<Booking>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<ApiResponse<Vec<Booking>>, ApiResponse<()>> {
    let bookings = state.bookings.list_mine(&caller).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Bookings retrieved", bookings))
}

/// Reviewer queue. Any admin role may list; `status` narrows the result.
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "Bookings",
    params(("status" = Option<BookingStatus>, Query, description = "Only bookings in this status")),
    responses(
        (status = 200, description = "Bookings retrieved", body = Vec<Booking>),
        (status = 403, description = "Caller holds no admin role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<BookingQuery>,
) -> Result<ApiResponse<Vec<Booking>>, ApiResponse<()>> {
    let bookings = state.bookings.queue(&caller, query.status).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Bookings retrieved", bookings))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking found", body = Booking),
        (status = 404, description = "Booking not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = state.bookings.visible_to(&caller, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Booking retrieved", booking))
}

/// ✅ Edit customer fields while the booking is `pending` or `change_requested`
#[utoipa::path(
    patch,
    path = "/bookings/{id}",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateCustomerDetails,
    responses(
        (status = 200, description = "Booking updated", body = Booking),
        (status = 400, description = "Invalid field value"),
        (status = 403, description = "Caller does not own the booking"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is no longer editable")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCustomerDetails>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = state.bookings.update_details(&caller, id, patch).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Booking updated", booking))
}

/// Applies a reviewer action. The new status and its audit entry are
/// committed together or not at all.
#[utoipa::path(
    post,
    path = "/bookings/{id}/actions",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Transition committed", body = ActionOutcome),
        (status = 400, description = "Missing notes or invalid advance amount"),
        (status = 403, description = "Role may not perform this action now"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking changed since it was loaded"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn apply_action(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(request): Json<ActionRequest>,
) -> Result<ApiResponse<ActionOutcome>, ApiResponse<()>> {
    let outcome = state.workflow.apply_action(id, &caller, request).await?;
    let message = format!("Booking moved to {}", outcome.booking.status);
    Ok(ApiResponse::success(StatusCode::OK, message, outcome))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/payment",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = PaymentConfirmation,
    responses(
        (status = 200, description = "Payment recorded", body = Booking),
        (status = 400, description = "Booking is not awaiting payment or amount too low"),
        (status = 403, description = "Client confirmations are not trusted"),
        (status = 409, description = "Advance already paid")
    ),
    security(("bearerAuth" = []))
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(payment): Json<PaymentConfirmation>,
) -> Result<ApiResponse<Booking>, ApiResponse<()>> {
    let booking = state.bookings.confirm_payment(&caller, id, payment).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Payment recorded", booking))
}

/// Audit history of a booking, newest first.
#[utoipa::path(
    get,
    path = "/bookings/{id}/audit",
    tag = "Bookings",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Audit entries", body = Vec<AuditLogEntry>),
        (status = 404, description = "Booking not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn booking_audit(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<AuditLogEntry>>, ApiResponse<()>> {
    state.bookings.visible_to(&caller, id).await?;
    let entries = state.audit.list_for(id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Audit history retrieved", entries))
}

/// Booking routes, mounted behind the identity middleware.
///
/// # Routes
/// - `POST /bookings`, `GET /bookings`, `GET /bookings/mine`
/// - `GET|PATCH /bookings/{id}`
/// - `POST /bookings/{id}/actions`, `POST /bookings/{id}/payment`
/// - `GET /bookings/{id}/audit`
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/mine", get(my_bookings))
        .route("/bookings/{id}", get(get_booking).patch(update_booking))
        .route("/bookings/{id}/actions", post(apply_action))
        .route("/bookings/{id}/payment", post(confirm_payment))
        .route("/bookings/{id}/audit", get(booking_audit))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_booking,
        my_bookings,
        list_bookings,
        get_booking,
        update_booking,
        apply_action,
        confirm_payment,
        booking_audit
    ),
    components(schemas(
        Booking,
        BookingStatus,
        PaymentStatus,
        NewBooking,
        UpdateCustomerDetails,
        PaymentConfirmation,
        ActionRequest,
        ActionOutcome,
        BookingAction,
        AuditLogEntry
    )),
    tags((name = "Bookings", description = "Booking requests and the review workflow")),
    modifiers(&SecurityAddon)
)]
pub struct BookingDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::{app, authed_get, authed_json, read_json, token_for};
    use crate::bookings::test_support::{hall, new_booking};
    use crate::db::models::role::AdminRole;
    use crate::roles::test_support::{account, account_with_role};
    use axum::http::Method;
    use serde_json::json;
    use tower::ServiceExt;

    async fn act(
        state: &AppState,
        token: &str,
        id: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = app(state)
            .oneshot(authed_json(
                Method::POST,
                &format!("/bookings/{}/actions", id),
                token,
                body,
            ))
            .await
            .unwrap();
        let status = response.status();
        (status, read_json(response).await)
    }

    #[tokio::test]
    async fn booking_walks_the_whole_review_chain() {
        let (state, store) = AppState::in_memory();
        let lotus = store.insert_hall(hall("Lotus", 5000, 200));
        let customer = account(&store, "asha@example.com").await;
        let admin1 = account_with_role(&store, "a1@venue.in", AdminRole::Admin1).await;
        let admin2 = account_with_role(&store, "a2@venue.in", AdminRole::Admin2).await;
        let admin3 = account_with_role(&store, "a3@venue.in", AdminRole::Admin3).await;
        let customer_token = token_for(&state, &customer);

        let response = app(&state)
            .oneshot(authed_json(
                Method::POST,
                "/bookings",
                &customer_token,
                new_booking_json(lotus.id),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["payment_status"], "unpaid");

        let (status, _) = act(&state, &token_for(&state, &admin1), &id, json!({"action": "approve"})).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = act(
            &state,
            &token_for(&state, &admin2),
            &id,
            json!({"action": "request_payment", "advance_amount": "5000"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["booking"]["status"], "payment_pending");

        // Forwarding before the advance arrives is refused.
        let (status, body) = act(
            &state,
            &token_for(&state, &admin2),
            &id,
            json!({"action": "forward_to_admin3"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "the advance payment has not been received yet");

        let response = app(&state)
            .oneshot(authed_json(
                Method::POST,
                &format!("/bookings/{}/payment", id),
                &customer_token,
                json!({"amount": "5000"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _) = act(
            &state,
            &token_for(&state, &admin2),
            &id,
            json!({"action": "forward_to_admin3", "expected_status": "payment_pending"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = act(&state, &token_for(&state, &admin3), &id, json!({"action": "approve"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["booking"]["status"], "approved");
        assert!(body["data"]["booking"]["confirmation_number"].is_string());

        let response = app(&state)
            .oneshot(authed_get(&format!("/bookings/{}/audit", id), &customer_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 4);
        assert_eq!(body["data"][0]["new_status"], "approved");
        assert_eq!(body["data"][3]["previous_status"], "pending");
    }

    fn new_booking_json(hall_id: Uuid) -> serde_json::Value {
        let draft = new_booking(vec![hall_id]);
        json!({
            "hall_ids": draft.hall_ids,
            "booking_date": draft.booking_date,
            "start_time": draft.start_time,
            "end_time": draft.end_time,
            "customer_name": draft.customer_name,
            "customer_email": draft.customer_email,
            "event_type": draft.event_type,
            "guest_count": draft.guest_count
        })
    }

    #[tokio::test]
    async fn customers_cannot_review_or_list_the_queue() {
        let (state, store) = AppState::in_memory();
        let lotus = store.insert_hall(hall("Lotus", 5000, 200));
        let customer = account(&store, "asha@example.com").await;
        let token = token_for(&state, &customer);
        let booking = state
            .bookings
            .create(
                &Caller::customer(customer.id),
                new_booking(vec![lotus.id]),
                Utc::now().date_naive(),
            )
            .await
            .unwrap();

        let (status, _) = act(&state, &token, &booking.id.to_string(), json!({"action": "approve"})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let response = app(&state).oneshot(authed_get("/bookings", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&state).oneshot(authed_get("/bookings/mine", &token)).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queue_filters_by_status() {
        let (state, store) = AppState::in_memory();
        let admin2 = account_with_role(&store, "a2@venue.in", AdminRole::Admin2).await;
        let owner = account(&store, "asha@example.com").await;
        for status in [BookingStatus::Pending, BookingStatus::DocumentReview] {
            let mut booking = crate::workflow::test_support::booking_at(status);
            booking.user_id = owner.id;
            store.seed_booking(booking);
        }

        let response = app(&state)
            .oneshot(authed_get(
                "/bookings?status=document_review",
                &token_for(&state, &admin2),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        let listed = body["data"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["status"], "document_review");
    }

    #[tokio::test]
    async fn stale_expected_status_returns_conflict() {
        let (state, store) = AppState::in_memory();
        let admin1 = account_with_role(&store, "a1@venue.in", AdminRole::Admin1).await;
        let booking = store.seed_booking(crate::workflow::test_support::booking_at(
            BookingStatus::Pending,
        ));

        let (status, _) = act(
            &state,
            &token_for(&state, &admin1),
            &booking.id.to_string(),
            json!({"action": "approve", "expected_status": "change_requested"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
