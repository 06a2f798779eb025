use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthMiddleware, AuthUser};
use crate::services::credential_store::CredentialStore;
use crate::services::token_expiry::check_token_expiry;
use crate::services::CredentialService;
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/google")
            .wrap(AuthMiddleware)
            .route("/url", web::get().to(google_auth_url))
            .route("/status", web::get().to(google_status))
            .route("/disconnect", web::post().to(google_disconnect)),
    );
}

/// Builds the provider consent URL. Offline access is required so a refresh
/// token is granted, and consent is forced so reconnecting users get a new
/// refresh token instead of a silent approval with none.
async fn google_auth_url(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let google = &state.config.google;

    let url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&access_type=offline&include_granted_scopes=true&prompt=consent&scope={}",
        google.authorize_url,
        urlencoding::encode(&google.client_id),
        urlencoding::encode(&google.redirect_uri),
        urlencoding::encode(&google.scopes.join(" ")),
    );

    Ok(HttpResponse::Ok().json(json!({ "url": url })))
}

/// Connection state for the dashboard. Read-only: reports the expiry verdict
/// without triggering a refresh.
async fn google_status(state: web::Data<AppState>, auth: AuthUser) -> AppResult<HttpResponse> {
    let store = CredentialService::new(&state.db);
    let credential = store.find_credential_by_email(&auth.user.email).await?;

    let Some(credential) = credential else {
        return Ok(HttpResponse::Ok().json(json!({ "connected": false })));
    };

    let expiry = check_token_expiry(credential.expires_at_ms);

    Ok(HttpResponse::Ok().json(json!({
        "connected": credential.is_valid,
        "provider": credential.provider,
        "scope": credential.scope,
        "has_refresh_token": credential.refresh_token.is_some(),
        "expiry": expiry,
    })))
}

/// User-initiated disconnect; same deactivation path the refresh stage takes
/// when the provider reports the grant dead.
async fn google_disconnect(state: web::Data<AppState>, auth: AuthUser) -> AppResult<HttpResponse> {
    let store = CredentialService::new(&state.db);

    let user_id = store
        .find_user_id_by_email(&auth.user.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    store.deactivate_tokens(&user_id).await?;
    tracing::info!("Calendar disconnected for {}", auth.user.email);

    Ok(HttpResponse::Ok().json(json!({ "status": true })))
}
