pub mod calendar;
pub mod credential_store;
pub mod token_expiry;
pub mod token_pipeline;
pub mod token_refresh;
pub mod user;

pub use calendar::CalendarClient;
pub use credential_store::{CredentialService, CredentialStore};
pub use token_pipeline::CalendarAccessContext;
pub use token_refresh::GoogleTokenRefresher;
pub use user::UserService;
