use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::models::{Account, PromptRecord};
use crate::db::{PromptStore, UserStore};
use crate::error::DatabaseError;

#[derive(Default)]
struct StoreData {
    accounts: HashMap<String, Account>, // email -> account
    prompts: Vec<PromptRecord>,
}

/// In-process store backing both traits. Used for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn put(&self, account: &Account) -> Result<(), DatabaseError> {
        let mut data = self.data.write().await;
        if data.accounts.contains_key(&account.email) {
            return Err(DatabaseError::Duplicate);
        }
        debug!("Storing account {} for {}", account.id, account.email);
        data.accounts.insert(account.email.clone(), account.clone());
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, DatabaseError> {
        Ok(self.data.read().await.accounts.get(email).cloned())
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn put(&self, record: &PromptRecord) -> Result<(), DatabaseError> {
        self.data.write().await.prompts.push(record.clone());
        Ok(())
    }

    async fn count_by_email_and_date(&self, email: &str, date: NaiveDate) -> Result<u64, DatabaseError> {
        let data = self.data.read().await;
        let count = data
            .prompts
            .iter()
            .filter(|r| r.email == email && r.created_at.date_naive() == date)
            .count();
        Ok(count as u64)
    }
}
