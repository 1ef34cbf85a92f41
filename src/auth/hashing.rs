//! Password hashing with bcrypt.
//!
//! Hashing and verification run on the blocking pool; a cost-12 bcrypt round
//! takes long enough to stall the async executor otherwise.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::errors::{PasswordPalError, Result};

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: Arc<OnceCell<String>>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").field("cost", &self.cost).finish()
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost, dummy_hash: Arc::new(OnceCell::new()) }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = zeroize::Zeroizing::new(password.to_string());
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password.as_bytes(), cost))
            .await
            .map_err(|e| PasswordPalError::internal(format!("hashing task failed: {}", e)))?
            .map_err(|e| PasswordPalError::internal(format!("failed to hash password: {}", e)))
    }

    /// Returns `Ok(false)` on mismatch; errors only for corrupt hashes.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = zeroize::Zeroizing::new(password.to_string());
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password.as_bytes(), &hash))
            .await
            .map_err(|e| PasswordPalError::internal(format!("verification task failed: {}", e)))?
            .map_err(|e| PasswordPalError::internal(format!("failed to verify password: {}", e)))
    }

    /// Burn the same CPU time as a real verification so unknown usernames
    /// are not distinguishable by latency.
    pub async fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy_hash.get_or_try_init(|| self.hash("dummy_startup_value")).await;
        if let Ok(hash) = dummy {
            let _ = self.verify(password, hash).await;
        }
    }
}
