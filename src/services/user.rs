use crate::db::Database;
use crate::error::AppResult;
use crate::models::User;
use crate::utils::time::current_timestamp_seconds;

pub struct UserService<'a> {
    db: &'a Database,
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a Database) -> Self {
        UserService { db }
    }

    pub async fn get_user_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, timezone, profile_image_url, status,
                   last_active_at, updated_at, created_at
            FROM "user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    #[allow(dead_code)]
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, timezone, profile_image_url, status,
                   last_active_at, updated_at, created_at
            FROM "user"
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    pub async fn update_user_last_active(&self, id: &str) -> AppResult<()> {
        let now = current_timestamp_seconds();

        sqlx::query(
            r#"
            UPDATE "user"
            SET last_active_at = $1
            WHERE id = $2
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.db.pool)
        .await?;

        Ok(())
    }
}

