use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Reviewer roles, in approval-chain order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Document verification
    Admin1,
    /// Availability & payment
    Admin2,
    /// Final approval
    Admin3,
    /// Final approval, overrides and role management
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::Admin1 => "admin1",
            AdminRole::Admin2 => "admin2",
            AdminRole::Admin3 => "admin3",
            AdminRole::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, FromRow, ToSchema)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role: AdminRole,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
