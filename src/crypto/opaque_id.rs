//! Opaque identifiers for shareable links

use rand::rngs::OsRng;
use rand::RngCore;
use uuid::{Builder, Uuid};

/// Generate the external handle for a secret.
///
/// A version 4 UUID built from 16 bytes of OS randomness (122 random bits).
/// Nothing about the value depends on content, time or creation order.
pub fn generate_opaque_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid().hyphenated().to_string()
}

/// Whether `value` has the shape of an identifier produced here
pub fn is_well_formed(value: &str) -> bool {
    Uuid::parse_str(value).map(|u| u.get_version_num() == 4).unwrap_or(false)
}
