use argon2::{password_hash::PasswordHash, Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;

use crate::{
    entities::users,
    error::{ApiError, FieldErrors},
    repo::users::UsersRepo,
    service::token::{TokenPair, TokenService, TokenType},
};

const INVALID_LOGIN: &str = "No active account found with the given credentials";
const MISSING_TOKEN: &str = "Authentication credentials were not provided.";
const INVALID_TOKEN: &str = "Given token not valid for any token type";

#[derive(Clone, Debug, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug)]
pub struct RegisterOutput {
    pub user: users::Model,
    pub tokens: TokenPair,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, ApiError>;
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError>;
    /// Resolves a bearer access token to its user.
    async fn authenticate(&self, access_token: Option<&str>) -> Result<users::Model, ApiError>;
}

pub struct AuthServiceImpl {
    users_repo: Arc<dyn UsersRepo>,
    tokens: Arc<dyn TokenService>,
}

pub(crate) fn add_field_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

pub(crate) fn normalize_email(email: &str) -> Result<String, &'static str> {
    let value = email.trim().to_lowercase();
    if value.is_empty() {
        return Err("This field may not be blank.");
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(value),
        _ => Err("Enter a valid email address."),
    }
}

impl AuthServiceImpl {
    pub fn new(users_repo: Arc<dyn UsersRepo>, tokens: Arc<dyn TokenService>) -> Self {
        Self { users_repo, tokens }
    }

    fn normalize_username(username: &str) -> Result<String, &'static str> {
        let value = username.trim().to_lowercase();
        if value.is_empty() {
            return Err("This field may not be blank.");
        }
        if value.chars().count() > 150 {
            return Err("Ensure this field has no more than 150 characters.");
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
        {
            return Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.");
        }
        Ok(value)
    }

    fn validate_password(password: &str) -> Result<(), &'static str> {
        if password.len() < 8 {
            return Err("password must be at least 8 characters");
        }
        let mut has_upper = false;
        let mut has_lower = false;
        let mut has_digit = false;
        let mut has_special = false;
        for ch in password.chars() {
            if ch.is_ascii_uppercase() {
                has_upper = true;
            } else if ch.is_ascii_lowercase() {
                has_lower = true;
            } else if ch.is_ascii_digit() {
                has_digit = true;
            } else {
                has_special = true;
            }
        }
        if !(has_upper && has_lower && has_digit && has_special) {
            return Err("password must include upper, lower, digit, and special character");
        }
        Ok(())
    }

    fn hash_password(password: &str) -> Result<String, ApiError> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = argon2::password_hash::SaltString::encode_b64(&salt)
            .map_err(|err| ApiError::unexpected(format!("password hash failed: {err}")))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| ApiError::unexpected(format!("password hash failed: {err}")))?
            .to_string();
        Ok(hash)
    }

    fn verify_password(hash: &str, password: &str) -> Result<(), ApiError> {
        let parsed = PasswordHash::new(hash).map_err(|_| ApiError::Auth(INVALID_LOGIN.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| ApiError::Auth(INVALID_LOGIN.to_string()))
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, ApiError> {
        let mut errors = FieldErrors::new();

        let username = match Self::normalize_username(&input.username) {
            Ok(value) => Some(value),
            Err(message) => {
                add_field_error(&mut errors, "username", message);
                None
            }
        };
        let email = match normalize_email(&input.email) {
            Ok(value) => Some(value),
            Err(message) => {
                add_field_error(&mut errors, "email", message);
                None
            }
        };
        if let Err(message) = Self::validate_password(&input.password) {
            add_field_error(&mut errors, "password", message);
        }
        if input.password != input.password2 {
            add_field_error(&mut errors, "password", "Password fields didn't match.");
        }
        if let Some(value) = &username {
            if self.users_repo.find_by_username(value).await?.is_some() {
                add_field_error(
                    &mut errors,
                    "username",
                    "A user with that username already exists.",
                );
            }
        }

        let (Some(username), Some(email), true) = (username, email, errors.is_empty()) else {
            return Err(ApiError::Fields(errors));
        };

        let password_hash = Self::hash_password(&input.password)?;
        let now = Utc::now();
        let model = users::ActiveModel {
            uid: sea_orm::Set(uuid::Uuid::new_v4()),
            username: sea_orm::Set(username),
            email: sea_orm::Set(email),
            first_name: sea_orm::Set(input.first_name.unwrap_or_default().trim().to_string()),
            last_name: sea_orm::Set(input.last_name.unwrap_or_default().trim().to_string()),
            password_hash: sea_orm::Set(password_hash),
            created_at: sea_orm::Set(now.into()),
            updated_at: sea_orm::Set(now.into()),
            ..Default::default()
        };
        let user = self.users_repo.insert(model).await?;
        let tokens = self.tokens.issue_pair(user.id).await?;
        tracing::info!(user_id = user.id, username = %user.username, "user registered");

        Ok(RegisterOutput { user, tokens })
    }

    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let normalized = username.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ApiError::Auth(INVALID_LOGIN.to_string()));
        }
        let Some(user) = self.users_repo.find_by_username(&normalized).await? else {
            return Err(ApiError::Auth(INVALID_LOGIN.to_string()));
        };
        Self::verify_password(&user.password_hash, password)?;
        self.tokens.issue_pair(user.id).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let Some(user_id) = self.tokens.resolve(refresh_token, TokenType::Refresh).await? else {
            return Err(ApiError::Auth("Token is invalid or expired".to_string()));
        };
        self.tokens.issue(user_id, TokenType::Access).await
    }

    async fn authenticate(&self, access_token: Option<&str>) -> Result<users::Model, ApiError> {
        let Some(token) = access_token.map(str::trim).filter(|token| !token.is_empty()) else {
            return Err(ApiError::Auth(MISSING_TOKEN.to_string()));
        };
        let Some(user_id) = self.tokens.resolve(token, TokenType::Access).await? else {
            return Err(ApiError::Auth(INVALID_TOKEN.to_string()));
        };
        self.users_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::Auth(INVALID_TOKEN.to_string()))
    }
}
