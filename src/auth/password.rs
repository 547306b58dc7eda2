use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version,
};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio::task;

use crate::config::SecurityConfig;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 params: {0}")]
    Params(String),
    #[error("Failed to hash password: {0}")]
    Hash(String),
    #[error("Invalid password hash format: {0}")]
    StoredHash(String),
    #[error("Password task panicked: {0}")]
    Join(#[from] task::JoinError),
}

/// Argon2id hashing. Hashing and verification run on the blocking pool since
/// both are CPU bound.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    decoy: Arc<OnceCell<String>>,
}

const DECOY_PASSWORD: &str = "decoy password";

impl PasswordHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self {
            params,
            decoy: Arc::new(OnceCell::new()),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let argon2 = self.argon2();
        let password = password.to_string();
        task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| PasswordError::Hash(e.to_string()))
        })
        .await?
    }

    /// `Ok(false)` on mismatch; errors only when the stored hash is unreadable.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        let argon2 = self.argon2();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored_hash)
                .map_err(|e| PasswordError::StoredHash(e.to_string()))?;
            Ok::<bool, PasswordError>(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await?
    }

    /// Run a full verify against a throwaway hash made with the same params,
    /// for callers that have no stored hash to check. The result is discarded.
    pub async fn verify_decoy(&self, password: &str) -> Result<(), PasswordError> {
        let decoy = self
            .decoy
            .get_or_try_init(|| self.hash(DECOY_PASSWORD))
            .await?;
        self.verify(password, decoy).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn decoy_ready(&self) -> bool {
        self.decoy.initialized()
    }
}
