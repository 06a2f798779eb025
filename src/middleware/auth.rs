use crate::error::AppError;
use crate::models::User;
use crate::services::user::UserService;
use crate::utils::auth::verify_jwt;
use crate::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    http::header,
    web, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

#[derive(Clone)]
pub struct AuthUser {
    pub user: User,
}

impl std::ops::Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

// Extractor for AuthUser from request extensions
impl actix_web::FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()));

        ready(result)
    }
}

// Auth middleware factory: resolves the authenticated principal from the
// upstream-issued JWT and attaches the user row to the request
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or_else(|| AppError::InternalServerError("App state not found".to_string()))?
                .clone();

            // Try the Authorization header first
            let token = if let Some(auth_header) = req.headers().get(header::AUTHORIZATION) {
                if let Ok(auth_str) = auth_header.to_str() {
                    auth_str.strip_prefix("Bearer ").map(|s| s.to_string())
                } else {
                    None
                }
            } else {
                None
            };

            // Fall back to the session cookie
            let token = token
                .or_else(|| req.cookie("token").map(|c| c.value().to_string()))
                .ok_or_else(|| {
                    AppError::Unauthenticated("Missing authorization token".to_string())
                })?;

            let claims = verify_jwt(&token, &state.config.jwt_secret).map_err(|e| {
                tracing::debug!("JWT verification failed: {:?}", e);
                AppError::Unauthenticated("Invalid or expired token".to_string())
            })?;

            // Check token expiration explicitly
            if let Some(exp) = claims.exp {
                let now = chrono::Utc::now().timestamp();
                if now > exp {
                    tracing::debug!("Token expired at {}, current time {}", exp, now);
                    return Err(AppError::Unauthenticated("Token expired".to_string()).into());
                }
            }

            let user_service = UserService::new(&state.db);
            let user = user_service
                .get_user_by_id(&claims.sub)
                .await?
                .ok_or_else(|| AppError::Unauthenticated("User not found".to_string()))?;

            // Best effort; a failed activity stamp must not fail the request
            if let Err(e) = user_service.update_user_last_active(&user.id).await {
                tracing::warn!("Failed to update last_active_at for {}: {}", user.id, e);
            }

            req.extensions_mut().insert(AuthUser { user });

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}
