pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod proxy;
pub mod secrets;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use actix_web::HttpResponse;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{AuthService, Claims, CredentialHasher, TokenCodec};
pub use chat::{ChatGateway, UsageGate};
pub use db::{Account, MemoryStore, PgStore, PromptRecord, PromptStore, UserStore};
pub use proxy::{CompletionProvider, GenerationParams, HttpCompletionProvider};
pub use secrets::{CachedSecretProvider, JsonFileSecretProvider, SecretProvider, StaticSecretProvider};

use crate::config::StorageBackend;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Runs a backend call with an upper bound; `elapsed` is returned if it runs out.
pub(crate) async fn with_timeout<T, E, F>(limit: Duration, call: F, elapsed: E) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or(Err(elapsed))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub chat_gateway: Arc<ChatGateway>,
}

impl AppState {
    /// Builds every backend named in `config`.
    pub async fn new(config: Settings) -> Result<Self> {
        let (users, prompts): (Arc<dyn UserStore>, Arc<dyn PromptStore>) = match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                let store = Arc::new(MemoryStore::new());
                let users: Arc<dyn UserStore> = store.clone();
                let prompts: Arc<dyn PromptStore> = store;
                (users, prompts)
            }
            StorageBackend::Postgres => {
                info!("Using PostgreSQL storage");
                let store = Arc::new(PgStore::connect_lazy(
                    &config.database.url,
                    config.database.max_connections,
                    config.timeouts.store(),
                )?);
                store.migrate().await?;
                let users: Arc<dyn UserStore> = store.clone();
                let prompts: Arc<dyn PromptStore> = store;
                (users, prompts)
            }
        };

        let base: Arc<dyn SecretProvider> = match &config.auth.secret_file {
            Some(path) => Arc::new(JsonFileSecretProvider::new(path)),
            None => Arc::new(StaticSecretProvider::new(config.auth.jwt_secret.clone())),
        };
        let secrets: Arc<dyn SecretProvider> = if config.auth.secret_cache_secs > 0 {
            Arc::new(CachedSecretProvider::new(
                base,
                Duration::from_secs(config.auth.secret_cache_secs),
            ))
        } else {
            base
        };

        let completion = Arc::new(HttpCompletionProvider::from_config(
            &config.completion,
            config.timeouts.completion(),
        )?);

        Ok(Self::from_parts(config, users, prompts, secrets, completion))
    }

    /// Wires the services over already-built collaborators.
    pub fn from_parts(
        config: Settings,
        users: Arc<dyn UserStore>,
        prompts: Arc<dyn PromptStore>,
        secrets: Arc<dyn SecretProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            users,
            secrets,
            CredentialHasher::new(config.auth.hash_iterations),
            TokenCodec::new(config.auth.token_ttl_secs),
            config.timeouts.clone(),
        ));
        let usage = UsageGate::new(prompts, &config.quota, config.timeouts.store());
        let chat_gateway = Arc::new(ChatGateway::new(
            auth_service.clone(),
            usage,
            completion,
            GenerationParams::from(&config.completion),
            config.timeouts.completion(),
        ));

        Self {
            config: Arc::new(config),
            auth_service,
            chat_gateway,
        }
    }
}
