use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ServerSettings;
use crate::handlers::{
    admin::{
        create_user_handler, delete_user_handler, get_user_handler, list_users_handler,
        update_user_handler,
    },
    app::{health_check, session_handler},
    auth::{
        login_handler, logout_handler, register_handler, request_password_reset_handler,
        reset_password_handler,
    },
    profile::{get_profile_handler, update_profile_handler},
    provider::provider_home_handler,
};
use crate::AppState;

fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    // Session setup
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(settings.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            settings.session_idle_hours,
        )));

    let admin_routes = Router::new()
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/session", get(session_handler))
        .route("/login", post(login_handler))
        .route("/register", post(register_handler))
        .route("/logout", post(logout_handler))
        .route("/password-reset", post(request_password_reset_handler))
        .route("/password-reset/:token", post(reset_password_handler))
        .route(
            "/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/service-provider", get(provider_home_handler))
        .nest("/admin", admin_routes)
        .layer(session_layer)
        .layer(cors_layer(settings))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
