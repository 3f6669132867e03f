//! Credential store
//!
//! Registration, login and password change on top of the user repository.
//!
//! `authenticate` reports `InvalidCredentials` for both an unknown email and
//! a wrong password. For an unknown email it still runs one verification
//! against a throwaway hash, so the two cases also cost about the same time.

use sdk::errors::MarketError;
use sdk::types::{Principal, Role};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::db::{fault, User, UserRepository};

pub mod password;
pub mod session;

pub use password::PasswordHashing;
pub use session::SessionStore;

/// Normalise an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User identity store with hashing
#[derive(Clone)]
pub struct CredentialStore {
    users: UserRepository,
    hashing: PasswordHashing,
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    pub fn new(users: UserRepository, hashing: PasswordHashing) -> Self {
        Self {
            users,
            hashing,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Create an account with role `user`
    ///
    /// # Errors
    ///
    /// - `MissingFields` when email or password is empty
    /// - `AlreadyRegistered` when the email is taken
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, MarketError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(MarketError::MissingFields);
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if self.users.email_exists(&email).await.map_err(fault)? {
            debug!("Registration refused: email already registered");
            return Err(MarketError::AlreadyRegistered);
        }

        let hash = self.hashing.hash_async(password).await?;

        match self
            .users
            .create_user(&email, &hash, name)
            .await
            .map_err(fault)?
        {
            Some(user) => {
                info!("Registered user {}", user.id);
                Ok(user)
            }
            // Lost a race with a concurrent registration
            None => Err(MarketError::AlreadyRegistered),
        }
    }

    /// Check an email/password pair
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, MarketError> {
        let email = normalize_email(email);
        let user = self.users.get_user_by_email(&email).await.map_err(fault)?;

        let Some(user) = user else {
            let dummy = self.dummy_hash().await?;
            self.hashing.verify_async(password, dummy).await?;
            return Err(MarketError::InvalidCredentials);
        };

        if self
            .hashing
            .verify_async(password, &user.password_hash)
            .await?
        {
            debug!("User {} authenticated", user.id);
            Ok(user)
        } else {
            Err(MarketError::InvalidCredentials)
        }
    }

    /// Replace a user's password after verifying the current one
    ///
    /// # Errors
    ///
    /// - `MissingFields` when either password is empty
    /// - `WrongPassword` when `old_password` does not verify
    /// - `Unauthenticated` when the account no longer exists
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), MarketError> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(MarketError::MissingFields);
        }

        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(fault)?
            .ok_or(MarketError::Unauthenticated)?;

        if !self
            .hashing
            .verify_async(old_password, &user.password_hash)
            .await?
        {
            return Err(MarketError::WrongPassword);
        }

        let hash = self.hashing.hash_async(new_password).await?;
        if !self
            .users
            .update_password(user.id, &hash)
            .await
            .map_err(fault)?
        {
            return Err(MarketError::Unauthenticated);
        }

        info!("Password changed for user {}", user.id);
        Ok(())
    }

    /// Load the current principal for a user id
    pub async fn principal(&self, user_id: i64) -> Result<Option<Principal>, MarketError> {
        let user = self.users.get_user(user_id).await.map_err(fault)?;
        Ok(user.map(|u| u.principal()))
    }

    /// Assign a role (operator tooling only)
    ///
    /// Returns false when no account has this email.
    pub async fn set_role(&self, email: &str, role: Role) -> Result<bool, MarketError> {
        let email = normalize_email(email);
        let updated = self.users.set_role(&email, role).await.map_err(fault)?;
        if updated {
            info!("Role of {} set to {}", email, role);
        }
        Ok(updated)
    }

    async fn dummy_hash(&self) -> Result<&String, MarketError> {
        self.dummy_hash
            .get_or_try_init(|| self.hashing.hash_async("plost-timing-equaliser"))
            .await
    }
}

impl User {
    /// Identity view attached to requests
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            name: self.name.clone(),
        }
    }
}
