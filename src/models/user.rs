use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub timezone: Option<String>,
    pub profile_image_url: Option<String>,
    pub status: String,
    pub last_active_at: i64,
    pub updated_at: i64,
    pub created_at: i64,
}
