//! HTTP handlers, grouped by resource. Everything except `auth` and `health`
//! sits behind the JWT and identity middleware.

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod documents;
pub mod halls;
pub mod health;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::app_state::AppState;
use crate::middleware::auth::{identity_middleware, jwt_middleware};

/// Routes that need a valid bearer token. The identity layer runs after the
/// JWT layer has attached the claims.
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(halls::hall_routes())
        .merge(bookings::booking_routes())
        .merge(documents::document_routes())
        .merge(admin::admin_routes())
        .route_layer(from_fn_with_state(state.clone(), identity_middleware))
        .route_layer(from_fn_with_state(state, jwt_middleware))
}

/// The whole API without the docs UI and the outer tower layers.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth::auth_routes())
        .merge(health::health_routes())
        .merge(protected_routes(state))
}

#[cfg(test)]
pub(crate) mod test_util {
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use axum::Router;

    use crate::api::auth::issue_token;
    use crate::app_state::AppState;
    use crate::db::models::user::User;

    /// The full API router over `state`.
    pub fn app(state: &AppState) -> Router {
        super::api_routes(state.clone()).with_state(state.clone())
    }

    pub fn token_for(state: &AppState, user: &User) -> String {
        issue_token(&state.config, user.id, &user.email).unwrap()
    }

    pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn authed_json(
        method: Method,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut request = json_request(method, uri, body);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        request
    }

    pub fn authed_get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    pub async fn read_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
