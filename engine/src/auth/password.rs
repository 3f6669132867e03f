//! Password hashing
//!
//! One-way argon2id hashing in PHC string format. The cost parameters come
//! from `[security]` in the config; verification reads the parameters that
//! are embedded in each stored hash, so raising the cost later does not lock
//! out existing accounts.
//!
//! Hashing is CPU-bound on purpose. The async helpers move it onto the
//! blocking pool so a login never stalls unrelated requests.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use sdk::errors::MarketError;

use crate::config::SecurityConfig;

/// Argon2id hasher with fixed cost parameters
#[derive(Debug, Clone)]
pub struct PasswordHashing {
    params: Params,
}

impl PasswordHashing {
    /// Build a hasher from the security configuration
    pub fn new(config: &SecurityConfig) -> Result<Self, MarketError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| MarketError::Config(format!("Invalid argon2 parameters: {}", e)))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, MarketError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| MarketError::Storage(format!("Password hashing failed: {}", e)))
    }

    /// Check a password against a stored hash
    ///
    /// A malformed stored hash verifies as false.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    /// `hash` on the blocking pool
    pub async fn hash_async(&self, password: &str) -> Result<String, MarketError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| MarketError::Storage(format!("Hashing task failed: {}", e)))?
    }

    /// `verify` on the blocking pool
    pub async fn verify_async(&self, password: &str, stored: &str) -> Result<bool, MarketError> {
        let hasher = self.clone();
        let password = password.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| MarketError::Storage(format!("Verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHashing {
        PasswordHashing::new(&SecurityConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_is_not_plaintext() {
        let hasher = fast();
        let hash = hasher.hash("pw1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));
        // Fresh salt per hash
        assert_ne!(hash, hasher.hash("pw1").unwrap());
    }

    #[test]
    fn test_verify() {
        let hasher = fast();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("wrong horse", &hash));
        assert!(!hasher.verify("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_verify_uses_embedded_params() {
        let hash = fast().hash("pw").unwrap();
        let stronger = PasswordHashing::new(&SecurityConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        assert!(stronger.verify("pw", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = PasswordHashing::new(&SecurityConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[tokio::test]
    async fn test_async_round() {
        let hasher = fast();
        let hash = hasher.hash_async("pw").await.unwrap();
        assert!(hasher.verify_async("pw", &hash).await.unwrap());
        assert!(!hasher.verify_async("nope", &hash).await.unwrap());
    }
}
