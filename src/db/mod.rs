//! Persistence for accounts and prompt-usage records.
//!
//! Services only see the [`UserStore`] and [`PromptStore`] traits; the
//! in-memory and PostgreSQL backends are picked from configuration.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use chrono::NaiveDate;
use crate::error::DatabaseError;

pub use memory::MemoryStore;
pub use models::{Account, PromptRecord};
pub use operations::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`DatabaseError::Duplicate`] if the email is already taken.
    async fn put(&self, account: &Account) -> Result<(), DatabaseError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError>;
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn put(&self, record: &PromptRecord) -> Result<(), DatabaseError>;

    /// Number of records for `email` whose `created_at` falls on `date` (UTC).
    async fn count_by_email_and_date(&self, email: &str, date: NaiveDate) -> Result<u64, DatabaseError>;
}
