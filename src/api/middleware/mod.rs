pub mod auth;
pub mod logging;

pub use auth::{api_key_auth, API_KEY_HEADER};
pub use logging::request_logger;
