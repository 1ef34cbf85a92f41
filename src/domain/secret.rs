//! Stored secret records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::id::{SecretId, UserId};

/// A shared secret as persisted. The payload stays encrypted; only the
/// retrieval path decrypts it.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretRecord {
    pub id: SecretId,
    /// Opaque identifier used in the shareable link
    pub guid: String,
    /// Hex encoded ciphertext with the authentication tag appended
    pub encrypted_password: String,
    /// Hex encoded nonce
    pub encryption_iv: String,
    pub title: Option<String>,
    /// Owner; NULL once the owning account has been deleted
    pub created_by: Option<UserId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
    pub current_access_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SecretRecord {
    /// Remaining successful retrievals, when a quota is configured.
    pub fn remaining_accesses(&self) -> Option<i64> {
        self.max_access_count.map(|max| (max - self.current_access_count).max(0))
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.created_by.as_ref() == Some(user_id)
    }
}

/// Insert payload for a new secret.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub guid: String,
    pub encrypted_password: String,
    pub encryption_iv: String,
    pub title: Option<String>,
    pub created_by: UserId,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
}

/// Body of `POST /passwords`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSecretRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Max access count must be at least 1"))]
    pub max_access_count: Option<i64>,
}

/// Confirmation returned after storing a secret
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedSecret {
    pub id: SecretId,
    pub guid: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
    pub shareable_link: String,
}

impl CreatedSecret {
    pub fn from_record(record: &SecretRecord, shareable_link: String) -> Self {
        Self {
            id: record.id.clone(),
            guid: record.guid.clone(),
            title: record.title.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            max_access_count: record.max_access_count,
            shareable_link,
        }
    }
}

/// Owner-facing metadata; never carries the payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecretSummary {
    pub id: SecretId,
    pub guid: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
    pub current_access_count: i64,
    pub shareable_link: String,
}

impl SecretSummary {
    pub fn from_record(record: &SecretRecord, shareable_link: String) -> Self {
        Self {
            id: record.id.clone(),
            guid: record.guid.clone(),
            title: record.title.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
            max_access_count: record.max_access_count,
            current_access_count: record.current_access_count,
            shareable_link,
        }
    }
}

/// Result of a successful retrieval.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievedSecret {
    pub password: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_access_count: Option<i64>,
    pub current_access_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_accesses: Option<i64>,
}
