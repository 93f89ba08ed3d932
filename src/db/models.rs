use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered user. `email` is the natural key; `id` is never reused.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// hex(salt) followed by hex(derived key); see [`crate::auth::CredentialHasher`].
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// One successful chat completion. Only used for quota counting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromptRecord {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl PromptRecord {
    pub fn new(user_id: String, email: String, prompt: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            email,
            prompt,
            created_at: Utc::now(),
        }
    }
}
