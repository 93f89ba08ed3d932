use crate::auth::password::CredentialHasher;
use crate::auth::token::{Claims, TokenCodec};
use crate::config::TimeoutConfig;
use crate::db::{Account, UserStore};
use crate::error::{AppError, AuthError, DatabaseError, SecretError};
use crate::secrets::{SecretProvider, SigningKey};
use crate::{with_timeout, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredAccount {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub email: String,
    pub token: String,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    secrets: Arc<dyn SecretProvider>,
    hasher: CredentialHasher,
    codec: TokenCodec,
    timeouts: TimeoutConfig,
    // Verified against when the email is unknown so both failure paths cost the same.
    decoy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        secrets: Arc<dyn SecretProvider>,
        hasher: CredentialHasher,
        codec: TokenCodec,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            users,
            secrets,
            decoy_hash: hasher.hash(&Uuid::new_v4().to_string()),
            hasher,
            codec,
            timeouts,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<RegisteredAccount> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AppError::ValidationError("Password must not be empty".into()));
        }

        if self.find_account(&email).await?.is_some() {
            return Err(AuthError::Conflict.into());
        }

        let hasher = self.hasher;
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await?;

        let account = Account::new(email, password_hash);
        match with_timeout(self.timeouts.store(), self.users.put(&account), DatabaseError::Timeout).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration for the same email.
            Err(DatabaseError::Duplicate) => return Err(AuthError::Conflict.into()),
            Err(e) => return Err(e.into()),
        }

        info!("Registered account {} for {}", account.id, account.email);
        Ok(RegisteredAccount {
            id: account.id,
            email: account.email,
        })
    }

    /// Returns a signed token. Unknown email and wrong password are
    /// indistinguishable to the caller, whatever the email looks like.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = canonical_email(email);
        let account = self.find_account(&email).await?;

        let stored = account
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());
        let hasher = self.hasher;
        let candidate = password.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&stored, &candidate)).await?;

        let account = match account {
            Some(account) if verified => account,
            _ => {
                warn!("Rejected login for {}", email);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let key = self.signing_key().await?;
        let token = self
            .codec
            .issue(&account.id.to_string(), &account.email, &key, Utc::now())?;
        Ok(Session {
            email: account.email,
            token,
        })
    }

    pub async fn validate_token(&self, token: &str) -> Result<Claims> {
        let key = self.signing_key().await?;
        Ok(self.codec.validate(token, &key, Utc::now())?)
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        let account = with_timeout(
            self.timeouts.store(),
            self.users.get_by_email(email),
            DatabaseError::Timeout,
        )
        .await?;
        Ok(account)
    }

    async fn signing_key(&self) -> Result<SigningKey> {
        let key = with_timeout(self.timeouts.secret(), self.secrets.signing_key(), SecretError::Timeout).await?;
        Ok(key)
    }
}

fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_email(email: &str) -> Result<String> {
    let email = canonical_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationError("A valid email is required".into()));
    }
    Ok(email)
}
