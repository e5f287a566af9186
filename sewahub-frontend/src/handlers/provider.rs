use crate::handlers::profile::ProfileResponse;
use crate::middleware::auth::ProviderUser;
use crate::models::Envelope;
use crate::AppState;
use axum::{extract::State, Json};

/// Entry point of the service-provider area.
pub async fn provider_home_handler(
    State(state): State<AppState>,
    provider: ProviderUser,
) -> Json<Envelope<ProfileResponse>> {
    tracing::debug!(user_id = %provider.user.id, "Provider area opened");
    Json(Envelope::ok(
        "Provider area",
        ProfileResponse::new(provider.user, &state),
    ))
}
