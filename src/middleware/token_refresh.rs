use crate::error::AppError;
use crate::middleware::token_validation::CalendarAccess;
use crate::services::credential_store::CredentialService;
use crate::services::token_pipeline::refresh_calendar_tokens;
use crate::services::token_refresh::GoogleTokenRefresher;
use crate::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    web, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Refresh-stage middleware. Requires [`TokenValidationMiddleware`] to have
/// run on the same request; passes healthy credentials through untouched and
/// re-attaches the refreshed context otherwise.
///
/// [`TokenValidationMiddleware`]: crate::middleware::token_validation::TokenValidationMiddleware
pub struct TokenRefreshMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TokenRefreshMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type InitError = ();
    type Transform = TokenRefreshMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenRefreshMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct TokenRefreshMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TokenRefreshMiddlewareService<S>
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

            let access = req.extensions().get::<CalendarAccess>().cloned();
            let Some(access) = access else {
                return Err(AppError::InternalServerError(
                    "Token validation must run before token refresh".to_string(),
                )
                .into());
            };

            let store = CredentialService::new(&state.db);
            let refresher = GoogleTokenRefresher::new(state.config.google.clone());
            let ctx = refresh_calendar_tokens(&store, &refresher, access.0).await?;

            req.extensions_mut().insert(CalendarAccess(ctx));

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}
