use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::UserWithRole;
use crate::roles::{Caller, NewAdminAccount};
use crate::utils::api_response::ApiResponse;

/// ✅ **Role management request**, tagged by `action`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoleCommand {
    Create {
        email: String,
        password: String,
        full_name: String,
        role: AdminRole,
    },
    AssignRole {
        user_id: Uuid,
        role: AdminRole,
    },
    UpdateRole {
        user_id: Uuid,
        role: AdminRole,
    },
    RemoveRole {
        user_id: Uuid,
    },
    SearchUsers {
        #[serde(default)]
        search_term: Option<String>,
    },
}

/// Account created through `create`, without its password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminAccount {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: AdminRole,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RoleCommandResult {
    Account(AdminAccount),
    Role(UserRole),
    Users(Vec<UserWithRole>),
    Removed { user_id: Uuid },
}

/// Single entry point for super admins to manage admin accounts.
///
/// Every action re-checks that the caller still holds `super_admin`.
#[utoipa::path(
    post,
    path = "/admin/roles",
    tag = "Admin",
    request_body = RoleCommand,
    responses(
        (status = 200, description = "Action applied", body = RoleCommandResult),
        (status = 201, description = "Admin account created", body = RoleCommandResult),
        (status = 400, description = "Missing fields or role already assigned"),
        (status = 403, description = "Caller is not a super admin"),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    ),
    security(("bearerAuth" = []))
)]
pub async fn manage_roles(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(command): Json<RoleCommand>,
) -> Result<ApiResponse<RoleCommandResult>, ApiResponse<()>> {
    let roles = &state.roles;
    let requested_by = caller.user_id;

    let response = match command {
        RoleCommand::Create {
            email,
            password,
            full_name,
            role,
        } => {
            let account = NewAdminAccount {
                email,
                password,
                full_name,
                role,
            };
            let (user, row) = roles.create_admin(account, requested_by).await?;
            ApiResponse::success(
                StatusCode::CREATED,
                "Admin account created",
                RoleCommandResult::Account(AdminAccount {
                    user_id: user.id,
                    email: user.email,
                    full_name: user.full_name,
                    role: row.role,
                }),
            )
        }
        RoleCommand::AssignRole { user_id, role } => {
            let row = roles.assign(user_id, role, requested_by).await?;
            ApiResponse::success(StatusCode::OK, "Role assigned", RoleCommandResult::Role(row))
        }
        RoleCommand::UpdateRole { user_id, role } => {
            let row = roles.update(user_id, role, requested_by).await?;
            ApiResponse::success(StatusCode::OK, "Role updated", RoleCommandResult::Role(row))
        }
        RoleCommand::RemoveRole { user_id } => {
            roles.remove(user_id, requested_by).await?;
            ApiResponse::success(
                StatusCode::OK,
                "Role removed",
                RoleCommandResult::Removed { user_id },
            )
        }
        RoleCommand::SearchUsers { search_term } => {
            let users = roles
                .search_users(search_term.as_deref(), requested_by)
                .await?;
            ApiResponse::success(StatusCode::OK, "Users retrieved", RoleCommandResult::Users(users))
        }
    };
    Ok(response)
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/roles", post(manage_roles))
}

#[derive(OpenApi)]
#[openapi(
    paths(manage_roles),
    components(schemas(RoleCommand, RoleCommandResult, AdminAccount, UserRole, UserWithRole, AdminRole)),
    tags((name = "Admin", description = "Admin role management")),
    modifiers(&SecurityAddon)
)]
pub struct AdminDoc;
