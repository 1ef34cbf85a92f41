//! Retrieval policy for shared secrets.
//!
//! Checks run in a fixed order and stop at the first failure: active, then
//! expiry, then quota. Existence is handled by the caller's lookup.

use chrono::{DateTime, Utc};

use crate::domain::SecretRecord;
use crate::errors::GoneReason;

/// Decide whether `record` may be retrieved at `now`.
pub fn evaluate(record: &SecretRecord, now: DateTime<Utc>) -> Result<(), GoneReason> {
    if !record.is_active {
        return Err(GoneReason::Deleted);
    }

    if let Some(expires_at) = record.expires_at {
        if expires_at <= now {
            return Err(GoneReason::Expired);
        }
    }

    if let Some(max) = record.max_access_count {
        if record.current_access_count >= max {
            return Err(GoneReason::AccessLimitReached);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SecretId, UserId};
    use chrono::Duration;

    fn record() -> SecretRecord {
        let now = Utc::now();
        SecretRecord {
            id: SecretId::new(),
            guid: "guid".into(),
            encrypted_password: "00".into(),
            encryption_iv: "00".into(),
            title: None,
            created_by: Some(UserId::new()),
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
    fn unrestricted_secret_passes() {
        assert_eq!(evaluate(&record(), Utc::now()), Ok(()));
    }

    #[test]
    fn deleted_wins_over_everything() {
        let now = Utc::now();
        let r = SecretRecord {
            is_active: false,
            expires_at: Some(now - Duration::hours(1)),
            max_access_count: Some(1),
            current_access_count: 1,
            ..record()
        };
        assert_eq!(evaluate(&r, now), Err(GoneReason::Deleted));
    }

    #[test]
    fn expiry_is_checked_before_quota() {
        let now = Utc::now();
        let r = SecretRecord {
            expires_at: Some(now - Duration::seconds(1)),
            max_access_count: Some(1),
            current_access_count: 1,
            ..record()
        };
        assert_eq!(evaluate(&r, now), Err(GoneReason::Expired));
    }

    #[test]
    fn expiry_instant_is_exclusive() {
        let now = Utc::now();
        let r = SecretRecord { expires_at: Some(now), ..record() };
        assert_eq!(evaluate(&r, now), Err(GoneReason::Expired));
        assert_eq!(evaluate(&r, now - Duration::milliseconds(1)), Ok(()));
    }

    #[test]
    fn quota_boundary() {
        let now = Utc::now();
        let r = SecretRecord { max_access_count: Some(2), current_access_count: 1, ..record() };
        assert_eq!(evaluate(&r, now), Ok(()));
        let r = SecretRecord { current_access_count: 2, ..r };
        assert_eq!(evaluate(&r, now), Err(GoneReason::AccessLimitReached));
    }

    #[test]
    fn expired_secret_with_quota_left_is_gone() {
        let now = Utc::now();
        let r = SecretRecord {
            expires_at: Some(now - Duration::days(1)),
            max_access_count: Some(10),
            ..record()
        };
        assert_eq!(evaluate(&r, now), Err(GoneReason::Expired));
    }
}
