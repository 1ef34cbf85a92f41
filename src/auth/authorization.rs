//! Role and ownership checks.

use crate::auth::models::{AuthContext, AuthError};
use crate::auth::user::Role;
use crate::domain::SecretRecord;

/// Fail with `Forbidden` unless the caller holds the admin role.
pub fn authorize_admin(context: &AuthContext) -> Result<(), AuthError> {
    match context.role {
        Role::Admin => Ok(()),
        Role::User => Err(AuthError::Forbidden),
    }
}

/// Only the owner may manage a secret; admins get no bypass here.
pub fn is_secret_owner(context: &AuthContext, record: &SecretRecord) -> bool {
    record.is_owned_by(&context.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SecretId, UserId};
    use chrono::Utc;

    fn context(role: Role) -> AuthContext {
        AuthContext::new(UserId::new(), "someone".into(), "someone@example.com".into(), role)
    }

    fn record(owner: Option<UserId>) -> SecretRecord {
        let now = Utc::now();
        SecretRecord {
            id: SecretId::new(),
            guid: uuid::Uuid::new_v4().to_string(),
            encrypted_password: "00".into(),
            encryption_iv: "00".into(),
            title: None,
            created_by: owner,
            expires_at: None,
            max_access_count: None,
            current_access_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn admin_passes_admin_check() {
        assert!(authorize_admin(&context(Role::Admin)).is_ok());
    }

    #[test]
    fn user_fails_admin_check() {
        assert!(matches!(authorize_admin(&context(Role::User)), Err(AuthError::Forbidden)));
    }

    #[test]
    fn ownership_requires_matching_user() {
        let owner = context(Role::User);
        let admin = context(Role::Admin);
        let secret = record(Some(owner.user_id.clone()));

        assert!(is_secret_owner(&owner, &secret));
        assert!(!is_secret_owner(&admin, &secret));
        assert!(!is_secret_owner(&owner, &record(None)));
    }
}
