use async_trait::async_trait;
use sqlx::Row;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{CalendarCredential, OAuthTokenRow, RefreshedToken, GOOGLE_PROVIDER};
use crate::utils::time::{current_timestamp_seconds, millis_to_iso};

/// Narrow persistence contract the token pipeline depends on. Absence is a
/// value (`Ok(None)` means "not connected"), infrastructure failures are
/// explicit errors; write failures always propagate.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_credential_by_email(&self, email: &str)
        -> AppResult<Option<CalendarCredential>>;

    async fn find_user_id_by_email(&self, email: &str) -> AppResult<Option<String>>;

    async fn update_refreshed_token(
        &self,
        user_id: &str,
        refreshed: &RefreshedToken,
    ) -> AppResult<()>;

    async fn deactivate_tokens(&self, user_id: &str) -> AppResult<()>;
}

pub struct CredentialService<'a> {
    db: &'a Database,
}

impl<'a> CredentialService<'a> {
    pub fn new(db: &'a Database) -> Self {
        CredentialService { db }
    }

    async fn find_token_row(&self, user_id: &str) -> AppResult<Option<OAuthTokenRow>> {
        let row = sqlx::query_as::<_, OAuthTokenRow>(
            r#"
            SELECT user_id, access_token, refresh_token, token_type, scope,
                   id_token, expires_at, is_valid, provider
            FROM oauth_token
            WHERE user_id = $1 AND provider = $2
            "#,
        )
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl<'a> CredentialStore for CredentialService<'a> {
    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> AppResult<Option<CalendarCredential>> {
        let user = sqlx::query(
            r#"SELECT id, email FROM "user" WHERE LOWER(email) = LOWER($1) LIMIT 1"#,
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        let user_id: String = user.try_get("id")?;
        let user_email: String = user.try_get("email")?;

        let Some(token_row) = self.find_token_row(&user_id).await? else {
            return Ok(None);
        };

        Ok(Some(token_row.into_credential(user_email)))
    }

    async fn find_user_id_by_email(&self, email: &str) -> AppResult<Option<String>> {
        let row = sqlx::query(r#"SELECT id FROM "user" WHERE LOWER(email) = LOWER($1) LIMIT 1"#)
            .bind(email)
            .fetch_optional(&self.db.pool)
            .await?;

        Ok(row.map(|r| r.try_get("id")).transpose()?)
    }

    async fn update_refreshed_token(
        &self,
        user_id: &str,
        refreshed: &RefreshedToken,
    ) -> AppResult<()> {
        let expires_at = millis_to_iso(refreshed.expires_at_ms).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Refreshed expiry out of range: {}",
                refreshed.expires_at_ms
            ))
        })?;
        let now = current_timestamp_seconds();

        let result = sqlx::query(
            r#"
            UPDATE oauth_token
            SET access_token = $1,
                expires_at = $2,
                is_valid = TRUE,
                refresh_error_count = 0,
                last_refreshed_at = $3,
                updated_at = $3
            WHERE user_id = $4 AND provider = $5
            "#,
        )
        .bind(&refreshed.access_token)
        .bind(&expires_at)
        .bind(now)
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .execute(&self.db.pool)
        .await?;

        // A missing row here is a data-integrity bug, never a no-op
        if result.rows_affected() == 0 {
            return Err(AppError::InternalServerError(format!(
                "No calendar credential row to update for user {}",
                user_id
            )));
        }

        Ok(())
    }

    async fn deactivate_tokens(&self, user_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE oauth_token
            SET is_valid = FALSE, updated_at = $1
            WHERE user_id = $2 AND provider = $3
            "#,
        )
        .bind(current_timestamp_seconds())
        .bind(user_id)
        .bind(GOOGLE_PROVIDER)
        .execute(&self.db.pool)
        .await?;

        Ok(())
    }
}
