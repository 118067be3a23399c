use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::AdminRole;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Account to be inserted; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Profile as returned by the user search, annotated with its admin role.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, FromRow, ToSchema)]
pub struct UserWithRole {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Option<AdminRole>,
}
