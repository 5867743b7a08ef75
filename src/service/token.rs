use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::{entities::user_tokens, error::ApiError, repo::user_tokens::UserTokensRepo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Opaque bearer tokens. Only a SHA-256 of each token is persisted.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn issue(&self, user_id: i32, token_type: TokenType) -> Result<String, ApiError>;
    async fn issue_pair(&self, user_id: i32) -> Result<TokenPair, ApiError>;
    /// Returns the owning user id for a live, unrevoked token of the given type.
    async fn resolve(&self, token: &str, token_type: TokenType) -> Result<Option<i32>, ApiError>;
}

pub struct TokenServiceImpl {
    tokens_repo: Arc<dyn UserTokensRepo>,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl TokenServiceImpl {
    pub fn new(
        tokens_repo: Arc<dyn UserTokensRepo>,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
    ) -> Self {
        Self {
            tokens_repo,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn ttl_seconds(&self, token_type: TokenType) -> u64 {
        match token_type {
            TokenType::Access => self.access_ttl_seconds,
            TokenType::Refresh => self.refresh_ttl_seconds,
        }
    }
}

#[async_trait]
impl TokenService for TokenServiceImpl {
    async fn issue(&self, user_id: i32, token_type: TokenType) -> Result<String, ApiError> {
        let token = Self::generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.ttl_seconds(token_type) as i64);

        let model = user_tokens::ActiveModel {
            user_id: sea_orm::Set(user_id),
            token_hash: sea_orm::Set(Self::hash_token(&token)),
            token_type: sea_orm::Set(token_type.as_str().to_string()),
            expires_at: sea_orm::Set(expires_at.into()),
            revoked_at: sea_orm::Set(None),
            created_at: sea_orm::Set(now.into()),
            ..Default::default()
        };
        self.tokens_repo.insert(model).await?;

        Ok(token)
    }

    async fn issue_pair(&self, user_id: i32) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access).await?,
            refresh: self.issue(user_id, TokenType::Refresh).await?,
        })
    }

    async fn resolve(&self, token: &str, token_type: TokenType) -> Result<Option<i32>, ApiError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let record = self
            .tokens_repo
            .find_active_by_hash(&Self::hash_token(token), token_type.as_str())
            .await?;
        Ok(record.map(|record| record.user_id))
    }
}
