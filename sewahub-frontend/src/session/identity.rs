use crate::error::ApiError;
use crate::models::{AuthGrant, LoginRequest, ProfileUpdate, User};
use async_trait::async_trait;
use std::sync::Arc;

/// The authoritative source of identity: the SewaHub auth API.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Password login.
    async fn authenticate(&self, credentials: &LoginRequest) -> Result<AuthGrant, ApiError>;

    /// Current user for a bearer token.
    async fn who_am_i(&self, token: &str) -> Result<User, ApiError>;

    /// Partial profile update; returns the fresh record.
    async fn update_profile(&self, fields: &ProfileUpdate, token: &str) -> Result<User, ApiError>;
}

#[async_trait]
impl<T: IdentitySource + ?Sized> IdentitySource for Arc<T> {
    async fn authenticate(&self, credentials: &LoginRequest) -> Result<AuthGrant, ApiError> {
        (**self).authenticate(credentials).await
    }

    async fn who_am_i(&self, token: &str) -> Result<User, ApiError> {
        (**self).who_am_i(token).await
    }

    async fn update_profile(&self, fields: &ProfileUpdate, token: &str) -> Result<User, ApiError> {
        (**self).update_profile(fields, token).await
    }
}
