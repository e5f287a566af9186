use crate::error::ApiError;
use crate::middleware::auth::SessionContext;
use crate::models::{
    Envelope, LoginRequest, NewPassword, PasswordResetRequest, RegisterRequest, Role, User,
};
use crate::session::{store, IdentitySource};
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub redirect_to: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub redirect_to: &'static str,
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, AppError> {
    payload.validate()?;

    let grant = state.identity.authenticate(&payload).await.map_err(|e| {
        tracing::info!(email = %payload.email, error = %e, "Login rejected");
        e
    })?;

    // New identity, new session id.
    if let Err(e) = session.store().rotate_id().await {
        tracing::warn!(error = %e, "Could not rotate session id on login");
    }
    store::persist_credentials(session.store(), &grant.token, &grant.user)
        .await
        .map_err(ApiError::from)?;

    let user = grant.user.clone();
    session.login(grant.token, grant.user).await;

    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        "User logged in successfully"
    );

    Ok(Json(Envelope::ok(
        "Login successful",
        LoginResponse {
            redirect_to: user.role.landing_path(),
            user,
        },
    )))
}

pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    if payload.role == Role::Admin {
        return Err(AppError::BadRequest(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let message = state.identity.register(&payload).await?;
    tracing::info!(role = %payload.role, "User registered");
    Ok(Json(Envelope::message(message)))
}

pub async fn logout_handler(session: SessionContext) -> Json<Envelope<LogoutResponse>> {
    let redirect_to = session.logout().await;
    Json(Envelope::ok("Logged out", LogoutResponse { redirect_to }))
}

pub async fn request_password_reset_handler(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    let message = state.identity.request_password_reset(&payload).await?;
    Ok(Json(Envelope::message(message)))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<NewPassword>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    let message = state.identity.reset_password(&token, &payload).await?;
    tracing::info!("Password reset completed");
    Ok(Json(Envelope::message(message)))
}
