//! Authentication and authorization module entry point.
//!
//! Session tokens, password hashing, Google sign-in, role checks and the
//! axum middleware that ties them to requests.

pub mod auth_service;
pub mod authorization;
pub mod google;
pub mod hashing;
pub mod jwt;
pub mod login_service;
pub mod middleware;
pub mod models;
pub mod user;
pub mod user_validation;

pub use auth_service::AuthService;
pub use google::{GoogleIdTokenVerifier, IdentityVerifier, VerifiedIdentity};
pub use hashing::PasswordHasher;
pub use jwt::{Claims, SessionTokenService};
pub use login_service::{LoginOutcome, LoginService};
pub use models::{AuthContext, AuthError};
pub use user::{AuthProvider, Role, User, UserProfile};
