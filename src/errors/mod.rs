//! # Error Handling
//!
//! Domain errors shared by every layer. The HTTP boundary maps them in
//! [`crate::api::error::ApiError`].

pub mod types;

pub use types::{AuthErrorType, GoneReason, PasswordPalError, Result};

pub type Error = PasswordPalError;
