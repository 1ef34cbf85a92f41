//! Secret lifecycle: create, retrieve, list and delete.
//!
//! Retrieval looks the secret up, evaluates the access policy, consumes one
//! unit of quota with a single conditional update and only then decrypts.
//! Every attempt leaves one audit entry, whatever the outcome.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::auth::models::AuthContext;
use crate::config::SharingConfig;
use crate::crypto::{generate_opaque_id, SecretCipher};
use crate::domain::{
    AccessType, CreateSecretRequest, CreatedSecret, NewSecret, Page, PageRequest, RequestOrigin,
    RetrievedSecret, SecretRecord, SecretSummary,
};
use crate::errors::{GoneReason, PasswordPalError, Result};
use crate::observability::metrics;
use crate::services::access_policy;
use crate::services::audit::AuditLogger;
use crate::storage::repositories::{SecretRepository, SqlxSecretRepository};
use crate::storage::DbPool;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Clone)]
pub struct SecretService {
    repository: Arc<dyn SecretRepository>,
    cipher: SecretCipher,
    audit: AuditLogger,
    sharing: SharingConfig,
}

impl SecretService {
    pub fn new(
        repository: Arc<dyn SecretRepository>,
        cipher: SecretCipher,
        audit: AuditLogger,
        sharing: SharingConfig,
    ) -> Self {
        Self { repository, cipher, audit, sharing }
    }

    pub fn with_sqlx(pool: DbPool, cipher: SecretCipher, sharing: SharingConfig) -> Self {
        Self::new(
            Arc::new(SqlxSecretRepository::new(pool.clone())),
            cipher,
            AuditLogger::with_sqlx(pool),
            sharing,
        )
    }

    /// Encrypt and store a secret for `owner`, returning its shareable link.
    #[instrument(skip(self, owner, request, origin), fields(user_id = %owner.user_id))]
    pub async fn create(
        &self,
        owner: &AuthContext,
        request: CreateSecretRequest,
        origin: &RequestOrigin,
    ) -> Result<CreatedSecret> {
        request.validate()?;

        let now = Utc::now();
        if let Some(expires_at) = request.expires_at {
            if expires_at <= now {
                return Err(PasswordPalError::validation_field(
                    "Expiration date must be in the future",
                    "expires_at",
                ));
            }
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let payload = self.cipher.encrypt(&request.password)?;
        let record = self
            .repository
            .create(NewSecret {
                guid: generate_opaque_id(),
                encrypted_password: payload.ciphertext_hex,
                encryption_iv: payload.nonce_hex,
                title,
                created_by: owner.user_id.clone(),
                expires_at: request.expires_at,
                max_access_count: request.max_access_count,
            })
            .await?;

        self.audit
            .record(Some(&record.id), Some(&owner.user_id), origin, AccessType::Create, true)
            .await;
        metrics::record_secret_created();
        info!(secret_id = %record.id, "Password stored");

        Ok(CreatedSecret::from_record(&record, self.sharing.shareable_link(&record.guid)))
    }

    /// Retrieve and decrypt a secret through its opaque identifier.
    #[instrument(skip(self, guid, actor, origin), fields(user_id = ?actor.map(|a| a.user_id.as_str())))]
    pub async fn retrieve(
        &self,
        guid: &str,
        actor: Option<&AuthContext>,
        origin: &RequestOrigin,
    ) -> Result<RetrievedSecret> {
        let actor_id = actor.map(|a| &a.user_id);

        let record = match self.repository.find_by_guid(guid).await? {
            Some(record) => record,
            None => {
                self.audit.record(None, actor_id, origin, AccessType::View, false).await;
                metrics::record_secret_retrieval("not_found");
                return Err(PasswordPalError::not_found("Password", guid));
            }
        };

        let now = Utc::now();
        if let Err(reason) = access_policy::evaluate(&record, now) {
            return Err(self.refuse(&record, actor, origin, reason).await);
        }

        let access_count = match self.repository.consume_access(&record.id, now).await? {
            Some(count) => count,
            None => {
                // Lost a race; report why the fresh state refuses access.
                let reason = match self.repository.find_by_id(&record.id).await? {
                    Some(fresh) => access_policy::evaluate(&fresh, now)
                        .err()
                        .unwrap_or(GoneReason::AccessLimitReached),
                    None => GoneReason::Deleted,
                };
                return Err(self.refuse(&record, actor, origin, reason).await);
            }
        };

        let password = match self.cipher.decrypt(&record.encrypted_password, &record.encryption_iv)
        {
            Ok(password) => password,
            Err(e) => {
                // The access is already consumed; a failed decrypt still counts against the quota.
                error!(secret_id = %record.id, error = %e, "Stored password could not be decrypted");
                self.audit.record(Some(&record.id), actor_id, origin, AccessType::View, false).await;
                metrics::record_secret_retrieval("decrypt_failed");
                return Err(e);
            }
        };

        self.audit.record(Some(&record.id), actor_id, origin, AccessType::View, true).await;
        metrics::record_secret_retrieval("success");
        info!(secret_id = %record.id, access_count, "Password retrieved");

        Ok(RetrievedSecret {
            password: password.as_str().to_string(),
            title: record.title,
            created_at: record.created_at,
            expires_at: record.expires_at,
            max_access_count: record.max_access_count,
            current_access_count: access_count,
            remaining_accesses: record.max_access_count.map(|max| (max - access_count).max(0)),
        })
    }

    async fn refuse(
        &self,
        record: &SecretRecord,
        actor: Option<&AuthContext>,
        origin: &RequestOrigin,
        reason: GoneReason,
    ) -> PasswordPalError {
        self.audit
            .record(Some(&record.id), actor.map(|a| &a.user_id), origin, AccessType::View, false)
            .await;
        metrics::record_secret_retrieval(reason.as_str());
        warn!(secret_id = %record.id, reason = reason.as_str(), "Password retrieval refused");
        PasswordPalError::gone(reason)
    }

    /// The caller's active secrets, newest first.
    #[instrument(skip(self, owner), fields(user_id = %owner.user_id))]
    pub async fn list(&self, owner: &AuthContext, page: PageRequest) -> Result<Page<SecretSummary>> {
        let total = self.repository.count_active_by_owner(&owner.user_id).await?;
        let records = self.repository.list_active_by_owner(&owner.user_id, page).await?;

        let summaries = records
            .iter()
            .map(|r| SecretSummary::from_record(r, self.sharing.shareable_link(&r.guid)))
            .collect();

        Ok(Page::new(summaries, total, page))
    }

    /// Soft delete a secret. Only its owner may do this.
    #[instrument(skip(self, guid, caller, origin), fields(user_id = %caller.user_id))]
    pub async fn delete(
        &self,
        caller: &AuthContext,
        guid: &str,
        origin: &RequestOrigin,
    ) -> Result<()> {
        let caller_id = Some(&caller.user_id);

        let record = match self.repository.find_by_guid(guid).await? {
            Some(record) => record,
            None => {
                self.audit.record(None, caller_id, origin, AccessType::Delete, false).await;
                return Err(PasswordPalError::not_found("Password", guid));
            }
        };

        if !crate::auth::authorization::is_secret_owner(caller, &record) {
            self.audit.record(Some(&record.id), caller_id, origin, AccessType::Delete, false).await;
            warn!(secret_id = %record.id, "Delete attempted by non-owner");
            return Err(PasswordPalError::forbidden("You can only delete your own passwords"));
        }

        if !record.is_active || !self.repository.soft_delete(&record.id, Utc::now()).await? {
            self.audit.record(Some(&record.id), caller_id, origin, AccessType::Delete, false).await;
            return Err(PasswordPalError::gone(GoneReason::Deleted));
        }

        self.audit.record(Some(&record.id), caller_id, origin, AccessType::Delete, true).await;
        info!(secret_id = %record.id, "Password deleted");
        Ok(())
    }
}
