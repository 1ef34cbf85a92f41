//! HTTP request handlers organized by resource type

pub mod admin;
pub mod auth;
pub mod health;
pub mod pagination;
pub mod passwords;

pub use admin::{
    create_user_handler, delete_user_handler, get_user_handler, list_logs_handler,
    list_users_handler, stats_handler, update_user_handler,
};
pub use auth::{google_login_handler, login_handler, logout_handler, me_handler};
pub use health::health_handler;
pub use passwords::{
    create_password_handler, delete_password_handler, generate_password_handler,
    list_passwords_handler, retrieve_password_handler,
};
