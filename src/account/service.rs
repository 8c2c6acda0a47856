use super::error::{AccountError, AccountResult};
use crate::auth::{NewUser, PasswordHasher, TokenIssuer, User, UserStore};
use std::sync::Arc;

/// Registration payload.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registration, login and per-user settings over a [`UserStore`].
pub struct AccountService {
    pub(super) store: Arc<dyn UserStore>,
    pub(super) hasher: Arc<PasswordHasher>,
    pub(super) tokens: Arc<TokenIssuer>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Create a new account. No token is issued here; clients log in next.
    pub async fn register(&self, registration: Registration) -> AccountResult<User> {
        let name = registration.name.trim();
        let email = registration.email.trim();
        if name.is_empty() || email.is_empty() || registration.password.is_empty() {
            return Err(AccountError::Validation(
                "Name, email and password are required".into(),
            ));
        }

        let password_hash = self.hash_blocking(registration.password).await?;
        let user = self
            .store
            .insert(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and issue a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> AccountResult<String> {
        let Some(user) = self.store.find_by_email(email.trim()).await? else {
            return Err(AccountError::UserNotFound);
        };

        if !self
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?
        {
            tracing::warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AccountError::InvalidPassword);
        }

        let token = self.tokens.issue(&user.id, &user.email)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(token)
    }

    /// Argon2 blocks for tens of milliseconds; run it on the blocking pool.
    pub(super) async fn hash_blocking(&self, password: String) -> AccountResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Internal(format!("hashing task failed: {e}")))??;
        Ok(digest)
    }

    pub(super) async fn verify_blocking(
        &self,
        password: String,
        digest: String,
    ) -> AccountResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AccountError::Internal(format!("verification task failed: {e}")))
    }
}
