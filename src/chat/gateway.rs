use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{AuthService, Claims};
use crate::chat::usage::UsageGate;
use crate::db::PromptRecord;
use crate::error::{AppError, ProxyError};
use crate::proxy::{CompletionProvider, GenerationParams};
use crate::{with_timeout, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub prompt: String,
    pub response: String,
    /// Requests served today, this one included.
    pub queries: u64,
    pub balance: u64,
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let value = authorization
        .ok_or_else(|| AppError::ValidationError("Authorization header missing".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::ValidationError("Invalid Authorization header format".into()))
}

/// Request pipeline for `/chat`: authenticate the bearer token, check the
/// caller's daily quota, forward the prompt, then record the usage.
/// Any failing step rejects the request; nothing is rolled back.
pub struct ChatGateway {
    auth: Arc<AuthService>,
    usage: UsageGate,
    completion: Arc<dyn CompletionProvider>,
    params: GenerationParams,
    completion_timeout: Duration,
}

impl ChatGateway {
    pub fn new(
        auth: Arc<AuthService>,
        usage: UsageGate,
        completion: Arc<dyn CompletionProvider>,
        params: GenerationParams,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            auth,
            usage,
            completion,
            params,
            completion_timeout,
        }
    }

    pub async fn authorize(&self, authorization: Option<&str>) -> Result<Claims> {
        let token = bearer_token(authorization)?;
        self.auth.validate_token(token).await
    }

    pub async fn handle(&self, authorization: Option<&str>, prompt: Option<&str>) -> Result<ChatReply> {
        let claims = self.authorize(authorization).await?;

        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::ValidationError("A non-empty prompt is required".into()))?;

        let used = self.usage.count_today(&claims.user).await?;
        if !self.usage.allows(used) {
            warn!("Daily quota exhausted for {} ({} used)", claims.user, used);
            return Err(AppError::QuotaExceeded);
        }

        let response = with_timeout(
            self.completion_timeout,
            self.completion.complete(prompt, &self.params),
            ProxyError::Timeout,
        )
        .await?;

        let record = PromptRecord::new(claims.sub.clone(), claims.user.clone(), prompt.to_string());
        self.usage.record(&record).await?;

        let queries = used + 1;
        info!("Served prompt {} for {} ({} today)", record.id, claims.user, queries);
        Ok(ChatReply {
            prompt: prompt.to_string(),
            response,
            queries,
            balance: self.usage.balance(queries),
        })
    }
}
