use crate::middleware::auth::SessionContext;
use crate::models::Envelope;
use crate::session::SessionView;
use axum::Json;

pub async fn health_check() -> &'static str {
    "OK"
}

/// What the navigation header needs: status and the cached user.
pub async fn session_handler(session: SessionContext) -> Json<Envelope<SessionView>> {
    let view = SessionView::from(&session.current());
    Json(Envelope::ok("Session state", view))
}
