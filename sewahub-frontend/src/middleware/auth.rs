//! Request extractors that hydrate the session and enforce access rules.

use crate::models::User;
use crate::session::{decide, Access, Area, CookieSessionStore, RefreshOutcome, SessionStatus};
use crate::{AppState, RequestSession};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use std::sync::Arc;
use tower_sessions::Session;

/// The hydrated session for this request. Built once per request and shared
/// between extractors through the request extensions.
#[derive(Clone)]
pub struct SessionContext(pub Arc<RequestSession>);

impl std::ops::Deref for SessionContext {
    type Target = RequestSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<SessionContext>() {
            return Ok(existing.clone());
        }

        let cookie_session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::InternalError(anyhow::anyhow!(msg)))?;
        let app = AppState::from_ref(state);

        let sync = RequestSession::new(CookieSessionStore::new(cookie_session), app.identity);
        sync.hydrate().await;

        let context = SessionContext(Arc::new(sync));
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

/// A signed-in user. The cached record is used as-is.
pub struct AuthUser {
    pub user: User,
    pub session: SessionContext,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionContext::from_request_parts(parts, state).await?;
        let current = session.current();

        match (decide(&current, Area::Member), current.user()) {
            (Access::Allow, Some(user)) => Ok(AuthUser {
                user: user.clone(),
                session: session.clone(),
            }),
            _ => Err(AppError::Unauthorized("Please sign in to continue".to_string())),
        }
    }
}

/// A signed-in provider, judged on the cached role. Other roles are sent to
/// their own landing page.
pub struct ProviderUser {
    pub user: User,
}

pub enum AreaRejection {
    App(AppError),
    /// Signed in, but this area belongs to another role.
    Elsewhere(&'static str),
}

impl From<AppError> for AreaRejection {
    fn from(err: AppError) -> Self {
        AreaRejection::App(err)
    }
}

impl IntoResponse for AreaRejection {
    fn into_response(self) -> Response {
        match self {
            AreaRejection::App(err) => err.into_response(),
            AreaRejection::Elsewhere(redirect_to) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "success": false,
                    "message": "This area is not available for your account",
                    "data": { "redirectTo": redirect_to }
                })),
            )
                .into_response(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ProviderUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AreaRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionContext::from_request_parts(parts, state).await?;
        let current = session.current();

        match (decide(&current, Area::Provider), current.user()) {
            (Access::Allow, Some(user)) => Ok(ProviderUser { user: user.clone() }),
            (Access::Redirect(path), Some(_)) => Err(AreaRejection::Elsewhere(path)),
            _ => Err(AppError::Unauthorized("Please sign in to continue".to_string()).into()),
        }
    }
}

/// A signed-in admin whose role was confirmed by a fresh whoami call; a
/// cached role is never enough for admin access.
pub struct AdminUser {
    pub user: User,
    pub token: String,
    pub session: SessionContext,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionContext::from_request_parts(parts, state).await?;

        if session.current().status() != SessionStatus::Authenticated {
            return Err(AppError::Unauthorized("Please sign in to continue".to_string()));
        }

        match session.refresh().await? {
            RefreshOutcome::Refreshed(_) => {}
            RefreshOutcome::Skipped | RefreshOutcome::Stale => {
                return Err(AppError::Unauthorized("Please sign in to continue".to_string()))
            }
        }

        let current = session.current();
        match (decide(&current, Area::Admin), current.user(), current.token()) {
            (Access::Allow, Some(user), Some(token)) => Ok(AdminUser {
                user: user.clone(),
                token: token.to_string(),
                session: session.clone(),
            }),
            _ => {
                tracing::warn!(
                    user_id = ?current.user().map(|u| u.id.as_str()),
                    "Non-admin attempted admin access"
                );
                Err(AppError::Forbidden("Admin access required".to_string()))
            }
        }
    }
}
