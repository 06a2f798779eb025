use reqwest::Client;
use serde_json::Value;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::services::token_pipeline::CalendarAccessContext;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Thin Google Calendar client, built per request from a pipeline context.
/// By the time this exists the token pipeline has already guaranteed the
/// access token is fresh.
pub struct CalendarClient {
    http: Client,
    access_token: String,
}

impl CalendarClient {
    pub fn from_context(ctx: &CalendarAccessContext) -> Self {
        CalendarClient {
            http: Client::new(),
            access_token: ctx.credential.access_token.clone(),
        }
    }

    pub async fn list_calendars(&self) -> AppResult<Value> {
        self.get(&format!("{}/users/me/calendarList", CALENDAR_API_BASE), &[])
            .await
    }

    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: Option<&str>,
        time_max: Option<&str>,
        max_results: Option<i64>,
    ) -> AppResult<Value> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let max_results = max_results.map(|m| m.to_string());
        let mut query: Vec<(&str, &str)> = vec![("singleEvents", "true"), ("orderBy", "startTime")];
        if let Some(time_min) = time_min {
            query.push(("timeMin", time_min));
        }
        if let Some(time_max) = time_max {
            query.push(("timeMax", time_max));
        }
        if let Some(max_results) = max_results.as_deref() {
            query.push(("maxResults", max_results));
        }

        self.get(&url, &query).await
    }

    pub async fn insert_event(&self, calendar_id: &str, event: &Value) -> AppResult<Value> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> AppResult<Value> {
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> AppResult<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Calendar API request failed: {} - {}", status, body);
            return Err(AppError::ExternalServiceError(format!(
                "Calendar API request failed with status {}",
                status
            )));
        }

        Ok(response.json().await?)
    }
}
