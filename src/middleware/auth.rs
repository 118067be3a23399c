use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::roles::Caller;
use crate::utils::api_response::ApiResponse;

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        warn!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        warn!("Invalid Authorization header format");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None)
            .into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    // Step 5: Insert claims into request extensions
    debug!("JWT decoded for user {}", token_data.claims.sub);
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

/// ✅ **Identity Middleware**: resolves the caller's admin role (cached) and
/// attaches a [`Caller`] to the request.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| {
        warn!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    let role = state.roles.role_of(user_id).await.map_err(|e| {
        error!("Failed to resolve role for {}: {}", user_id, e);
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load user permissions",
            None,
        )
        .into_response()
    })?;

    req.extensions_mut().insert(Caller { user_id, role });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::issue_token;
    use crate::db::models::role::AdminRole;
    use crate::roles::test_support::account_with_role;
    use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
    use tower::ServiceExt;

    async fn whoami(Extension(caller): Extension<Caller>) -> String {
        format!("{}:{:?}", caller.user_id, caller.role)
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state.clone(), identity_middleware))
            .layer(from_fn_with_state(state.clone(), jwt_middleware))
            .with_state(state)
    }

    fn get_with(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_or_bad_tokens_are_rejected() {
        let (state, _) = AppState::in_memory();
        let app = router(state);

        let response = app.clone().oneshot(get_with(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get_with(Some("not-a-jwt"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_resolves_caller_role() {
        let (state, store) = AppState::in_memory();
        let admin = account_with_role(&store, "a2@venue.in", AdminRole::Admin2).await;
        let token = issue_token(&state.config, admin.id, &admin.email).unwrap();

        let response = router(state).oneshot(get_with(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            format!("{}:Some(Admin2)", admin.id)
        );
    }
}
