use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{IntoActiveModel, Set};
use std::sync::Arc;

use crate::{
    entities::users,
    error::{ApiError, FieldErrors},
    repo::users::UsersRepo,
    service::auth::{add_field_error, normalize_email},
};

/// Partial update: `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct UpdateProfileInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn update(
        &self,
        user: users::Model,
        input: UpdateProfileInput,
    ) -> Result<users::Model, ApiError>;
}

pub struct ProfileServiceImpl {
    users_repo: Arc<dyn UsersRepo>,
}

impl ProfileServiceImpl {
    pub fn new(users_repo: Arc<dyn UsersRepo>) -> Self {
        Self { users_repo }
    }
}

#[async_trait]
impl ProfileService for ProfileServiceImpl {
    async fn update(
        &self,
        user: users::Model,
        input: UpdateProfileInput,
    ) -> Result<users::Model, ApiError> {
        let mut errors = FieldErrors::new();
        let email = match input.email.as_deref().map(normalize_email) {
            Some(Ok(value)) => Some(value),
            Some(Err(message)) => {
                add_field_error(&mut errors, "email", message);
                None
            }
            None => None,
        };
        if !errors.is_empty() {
            return Err(ApiError::Fields(errors));
        }

        let mut active = user.into_active_model();
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        active.updated_at = Set(Utc::now().into());

        Ok(self.users_repo.update(active).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{repo::users::SeaOrmUsersRepo, test_support};

    #[tokio::test]
    async fn update_touches_only_supplied_fields() {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "mira").await;
        let profiles = ProfileServiceImpl::new(Arc::new(SeaOrmUsersRepo::new(db.clone())));

        let updated = profiles
            .update(
                user.clone(),
                UpdateProfileInput {
                    first_name: Some(" Mira ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.first_name, "Mira");
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.username, "mira");
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_per_field() {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "omar").await;
        let profiles = ProfileServiceImpl::new(Arc::new(SeaOrmUsersRepo::new(db.clone())));

        let err = profiles
            .update(
                user,
                UpdateProfileInput {
                    email: Some("omar-at-example".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("invalid email");
        assert!(matches!(err, ApiError::Fields(fields) if fields.contains_key("email")));
    }
}
