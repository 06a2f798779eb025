use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthMiddleware, CalendarAccess, TokenRefreshMiddleware, TokenValidationMiddleware};
use crate::services::CalendarClient;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    // Every calendar route runs the full credential pipeline:
    // auth -> token validation -> token refresh -> handler.
    // actix executes the last-registered wrap first, so the registration
    // order below is the reverse of the execution order.
    cfg.service(
        web::scope("")
            .wrap(TokenRefreshMiddleware)
            .wrap(TokenValidationMiddleware)
            .wrap(AuthMiddleware)
            .route("/calendars", web::get().to(list_calendars))
            .route("/events", web::get().to(list_events))
            .route("/events", web::post().to(create_event)),
    );
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventsQuery {
    #[validate(length(min = 1, max = 500))]
    pub calendar_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[validate(range(min = 1, max = 2500))]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 1000))]
    pub summary: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(length(max = 1000))]
    pub location: Option<String>,
    pub start: serde_json::Value,
    pub end: serde_json::Value,
    #[validate(length(max = 500))]
    pub calendar_id: Option<String>,
}

async fn list_calendars(access: CalendarAccess) -> AppResult<HttpResponse> {
    let client = CalendarClient::from_context(&access);
    let calendars = client.list_calendars().await?;

    Ok(HttpResponse::Ok().json(calendars))
}

async fn list_events(
    access: CalendarAccess,
    query: web::Query<EventsQuery>,
) -> AppResult<HttpResponse> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let client = CalendarClient::from_context(&access);
    let events = client
        .list_events(
            query.calendar_id.as_deref().unwrap_or("primary"),
            query.start_date.as_deref(),
            query.end_date.as_deref(),
            query.limit,
        )
        .await?;

    Ok(HttpResponse::Ok().json(events))
}

async fn create_event(
    access: CalendarAccess,
    payload: web::Json<CreateEventRequest>,
) -> AppResult<HttpResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut event = json!({
        "summary": payload.summary,
        "start": payload.start,
        "end": payload.end,
    });
    if let Some(description) = &payload.description {
        event["description"] = json!(description);
    }
    if let Some(location) = &payload.location {
        event["location"] = json!(location);
    }

    let client = CalendarClient::from_context(&access);
    let created = client
        .insert_event(payload.calendar_id.as_deref().unwrap_or("primary"), &event)
        .await?;

    Ok(HttpResponse::Ok().json(created))
}
