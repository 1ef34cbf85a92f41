//! # Crypto Engine
//!
//! Payload encryption, opaque link identifiers and the password generator.
//! Pure CPU work; nothing here touches the database.

pub mod cipher;
pub mod generator;
pub mod opaque_id;

pub use cipher::{EncryptedPayload, SecretCipher, NONCE_SIZE};
pub use generator::{generate, GenerateOptions, GeneratedPassword, Strength};
pub use opaque_id::generate_opaque_id;
