use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::hall::BanquetHall;
use crate::utils::api_response::ApiResponse;

/// Lists the halls currently open for booking.
#[utoipa::path(
    get,
    path = "/halls",
    tag = "Halls",
    responses(
        (status = 200, description = "Active halls", body = Vec<BanquetHall>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_halls(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<BanquetHall>>, ApiResponse<()>> {
    let halls = state.stores.bookings.list_halls(true).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Halls retrieved", halls))
}

#[utoipa::path(
    get,
    path = "/halls/{id}",
    tag = "Halls",
    params(("id" = Uuid, Path, description = "Hall ID")),
    responses(
        (status = 200, description = "Hall found", body = BanquetHall),
        (status = 404, description = "Hall not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_hall(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<BanquetHall>, ApiResponse<()>> {
    match state.stores.bookings.get_hall(id).await? {
        Some(hall) if hall.is_active => Ok(ApiResponse::success(StatusCode::OK, "Hall retrieved", hall)),
        _ => Err(ApiResponse::error(StatusCode::NOT_FOUND, "hall not found", None)),
    }
}

pub fn hall_routes() -> Router<AppState> {
    Router::new()
        .route("/halls", get(list_halls))
        .route("/halls/{id}", get(get_hall))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_halls, get_hall),
    components(schemas(BanquetHall)),
    tags((name = "Halls", description = "Hall catalog")),
    modifiers(&SecurityAddon)
)]
pub struct HallDoc;
