use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bcrypt::{hash, verify};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::{Modify, OpenApi, ToSchema};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db::models::role::AdminRole;
use crate::db::models::user::NewUser;
use crate::db::store::StoreError;
use crate::roles::MIN_PASSWORD_LEN;
use crate::utils::api_response::ApiResponse;

/// Represents a request to register a new customer account.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Represents a successful registration response
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID (UUID) as String
    pub sub: String,
    pub email: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

/// Represents a request to log in
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    /// Admin role, absent for customers
    pub role: Option<AdminRole>,
}

/// Signs an HS256 token for `user_id` valid for `TOKEN_TTL_SECS`.
pub fn issue_token(
    config: &Config,
    user_id: Uuid,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = chrono::Utc::now().timestamp().max(0) as u64 + config.token_ttl_secs;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

fn invalid_credentials() -> ApiResponse<()> {
    ApiResponse::error(StatusCode::UNAUTHORIZED, "Invalid email or password.", None)
}

/// Handles user login
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(content = LoginRequest, description = "User login details"),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let user = state
        .stores
        .accounts
        .find_user_by_email(payload.email.trim())
        .await?;

    let Some(user) = user else {
        warn!("❌ Login attempt for unknown email: {}", payload.email);
        return Err(invalid_credentials());
    };

    match verify(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("❌ Invalid password attempt for user: {}", user.id);
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!("❌ Password verification error: {}", e);
            return Err(ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password verification error",
                None,
            ));
        }
    }

    let role = state.roles.role_of(user.id).await?;
    let token = issue_token(&state.config, user.id, &user.email).map_err(|e| {
        error!("Token generation failed: {}", e);
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token generation failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!("✅ Login successful for user: {}", user.id);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            token,
            user_id: user.id,
            role,
        },
    ))
}

/// Handles customer registration.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `400 Bad Request` - If a field is missing or malformed.
/// * `409 Conflict` - If the email is already registered.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Successful Register", body = RegisterResponse),
        (status = 400, description = "Invalid registration details"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    let email = payload.email.trim().to_lowercase();
    let full_name = payload.full_name.trim().to_string();
    if !email.contains('@') || full_name.is_empty() {
        return Err(ApiResponse::error(
            StatusCode::BAD_REQUEST,
            "A valid email and full name are required",
            None,
        ));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiResponse::error(
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            None,
        ));
    }

    let password_hash = hash(&payload.password, state.config.bcrypt_cost).map_err(|e| {
        error!("Password hashing failed: {}", e);
        ApiResponse::<()>::error(StatusCode::INTERNAL_SERVER_ERROR, "Password hashing failed", None)
    })?;

    let user = state
        .stores
        .accounts
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
            full_name,
            phone: payload
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                ApiResponse::error(StatusCode::CONFLICT, "Email already registered", None)
            }
            other => other.into(),
        })?;

    info!("✅ Registered user {}", user.id);
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "User registered",
        RegisterResponse {
            user_id: user.id,
            email: user.email,
        },
    ))
}

/// Registers the public authentication routes for the API.
///
/// # Routes
/// - `POST /auth/register` → Register a new customer.
/// - `POST /auth/login` → Authenticate and return a JWT token.
///
/// # Example Usage
/// ```sh
/// curl -X POST http://localhost:3000/auth/login -H "Content-Type: application/json" -d '{"email": "asha@example.com", "password": "securepassword"}'
/// ```
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register),
    components(schemas(LoginRequest, LoginResponse, RegisterRequest, RegisterResponse)),
    tags((name = "Authentication", description = "User Auth Endpoints")),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::{json_request, read_json};
    use axum::http::Method;
    use tower::ServiceExt;

    #[tokio::test]
    async fn register_then_login() {
        let (state, _) = AppState::in_memory();
        let app = auth_routes().with_state(state);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/auth/register",
                json!({"email": "Asha@Example.com", "password": "hunter22", "full_name": "Asha"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/auth/register",
                json!({"email": "asha@example.com", "password": "hunter22", "full_name": "Asha"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/auth/login",
                json!({"email": "asha@example.com", "password": "wrong-one"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/auth/login",
                json!({"email": "asha@example.com", "password": "hunter22"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(body["data"]["role"].is_null());
    }
}
