use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::models::hall::BanquetHall;

const HALL_COLUMNS: &str = r#"
    id, name, description, capacity, price_per_hour, amenities, images,
    panorama_url, is_active, created_at, updated_at
"#;

pub async fn list_halls<'e>(
    executor: impl PgExecutor<'e>,
    active_only: bool,
) -> Result<Vec<BanquetHall>, sqlx::Error> {
    sqlx::query_as::<_, BanquetHall>(&format!(
        "SELECT {HALL_COLUMNS} FROM banquet_halls WHERE ($1 = FALSE OR is_active) ORDER BY name"
    ))
    .bind(active_only)
    .fetch_all(executor)
    .await
}

pub async fn get_hall<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<BanquetHall>, sqlx::Error> {
    sqlx::query_as::<_, BanquetHall>(&format!(
        "SELECT {HALL_COLUMNS} FROM banquet_halls WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}
