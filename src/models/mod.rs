pub mod auth;
pub mod credential;
pub mod user;

pub use auth::Claims;
pub use credential::{CalendarCredential, OAuthTokenRow, RefreshedToken, GOOGLE_PROVIDER};
pub use user::User;
