use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// ✅ **Venue catalog entry** (read-only from the booking workflow)
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct BanquetHall {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    #[schema(value_type = String)]
    pub price_per_hour: BigDecimal,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub panorama_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
