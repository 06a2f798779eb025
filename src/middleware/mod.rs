pub mod auth;
pub mod token_refresh;
pub mod token_validation;

pub use auth::{AuthMiddleware, AuthUser};
pub use token_refresh::TokenRefreshMiddleware;
pub use token_validation::{CalendarAccess, TokenValidationMiddleware};
