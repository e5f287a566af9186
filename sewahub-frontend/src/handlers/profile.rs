use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::models::{Envelope, ProfileUpdate, User};
use crate::session::RefreshOutcome;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: User,
    pub initials: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileResponse {
    pub(crate) fn new(user: User, state: &AppState) -> Self {
        Self {
            initials: user.initials(),
            avatar_url: user.avatar_url(state.api.public_base()),
            user,
        }
    }
}

/// Profile page data, re-read from the API. An unreachable API falls back to
/// the cached record; an expired token ends the session.
pub async fn get_profile_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<ProfileResponse>>, AppError> {
    let (user, message) = match auth.session.refresh().await {
        Ok(RefreshOutcome::Refreshed(user)) => (user, "Profile loaded"),
        Ok(RefreshOutcome::Skipped | RefreshOutcome::Stale) => (auth.user, "Profile loaded"),
        Err(ApiError::Network(reason)) => {
            tracing::warn!(%reason, "Serving cached profile");
            (auth.user, "Showing cached profile")
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(Envelope::ok(message, ProfileResponse::new(user, &state))))
}

pub async fn update_profile_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<Envelope<ProfileResponse>>, AppError> {
    payload.validate()?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let user = auth.session.update_profile(&payload).await?;
    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(Envelope::ok(
        "Profile updated successfully",
        ProfileResponse::new(user, &state),
    )))
}
