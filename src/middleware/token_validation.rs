use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::credential_store::CredentialService;
use crate::services::token_pipeline::{validate_calendar_tokens, CalendarAccessContext};
use crate::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    web, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Pipeline context attached by the validation stage and consumed by the
/// refresh stage and the request handler.
#[derive(Clone)]
pub struct CalendarAccess(pub CalendarAccessContext);

impl std::ops::Deref for CalendarAccess {
    type Target = CalendarAccessContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl actix_web::FromRequest for CalendarAccess {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = req.extensions().get::<CalendarAccess>().cloned().ok_or_else(|| {
            AppError::InternalServerError(
                "Calendar access context missing; token pipeline did not run".to_string(),
            )
        });

        ready(result)
    }
}

/// Validation-stage middleware: loads the principal's calendar credential,
/// fails closed on anything unrefreshable, and attaches the credential plus
/// its expiry verdict to the request.
pub struct TokenValidationMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TokenValidationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type InitError = ();
    type Transform = TokenValidationMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenValidationMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct TokenValidationMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TokenValidationMiddlewareService<S>
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

            let principal = req
                .extensions()
                .get::<AuthUser>()
                .map(|auth| auth.user.email.clone());

            let store = CredentialService::new(&state.db);
            let ctx = validate_calendar_tokens(&store, principal.as_deref()).await?;

            req.extensions_mut().insert(CalendarAccess(ctx));

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}
