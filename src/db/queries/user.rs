use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::models::role::{AdminRole, UserRole};
use crate::db::models::user::{NewUser, User, UserWithRole};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, created_at";

pub async fn insert_user<'e>(
    executor: impl PgExecutor<'e>,
    user: &NewUser,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, phone)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .fetch_one(executor)
    .await
}

pub async fn get_user<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn get_user_by_email<'e>(
    executor: impl PgExecutor<'e>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Case-insensitive substring match on email or full name, with role.
pub async fn search_users<'e>(
    executor: impl PgExecutor<'e>,
    term: Option<&str>,
    limit: i64,
) -> Result<Vec<UserWithRole>, sqlx::Error> {
    let pattern = term
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", escape_like(t)));

    sqlx::query_as::<_, UserWithRole>(
        r#"
        SELECT u.id AS user_id, u.full_name, u.email, r.role
          FROM users u
          LEFT JOIN user_roles r ON r.user_id = u.id
         WHERE $1::text IS NULL OR u.email ILIKE $1 OR u.full_name ILIKE $1
         ORDER BY u.full_name, u.email
         LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(executor)
    .await
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn get_role<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Option<AdminRole>, sqlx::Error> {
    sqlx::query_scalar::<_, AdminRole>("SELECT role FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_role<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    role: AdminRole,
    created_by: Option<Uuid>,
) -> Result<UserRole, sqlx::Error> {
    sqlx::query_as::<_, UserRole>(
        r#"
        INSERT INTO user_roles (user_id, role, created_by)
        VALUES ($1, $2, $3)
        RETURNING user_id, role, created_by, created_at
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(created_by)
    .fetch_one(executor)
    .await
}

pub async fn update_role<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    role: AdminRole,
) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_as::<_, UserRole>(
        r#"
        UPDATE user_roles SET role = $2
         WHERE user_id = $1
        RETURNING user_id, role, created_by, created_at
        "#,
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(executor)
    .await
}

pub async fn delete_role<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn count_role<'e>(
    executor: impl PgExecutor<'e>,
    role: AdminRole,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_roles WHERE role = $1")
        .bind(role)
        .fetch_one(executor)
        .await
}
