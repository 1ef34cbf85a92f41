//! # REST API Components
//!
//! HTTP routing, middleware wiring and request/response handling for the
//! PasswordPal JSON API.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::build_router;
pub use server::start_api_server;
pub use state::AppState;
