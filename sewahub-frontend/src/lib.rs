pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;
pub mod startup;

use config::ApiSettings;
use services::{AdminUserClient, ApiClient, HttpIdentityClient};
use session::{CookieSessionStore, SessionSynchronizer};
use std::sync::Arc;

/// Per-request session synchronizer over the browser's cookie session.
pub type RequestSession = SessionSynchronizer<CookieSessionStore, Arc<HttpIdentityClient>>;

/// Shared application state containing API clients
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<HttpIdentityClient>,
    pub admin: Arc<AdminUserClient>,
    pub api: ApiSettings,
}

impl AppState {
    pub fn new(api: ApiSettings) -> Result<Self, error::ApiError> {
        let client = Arc::new(ApiClient::new(api.clone())?);
        Ok(Self {
            identity: Arc::new(HttpIdentityClient::new(client.clone())),
            admin: Arc::new(AdminUserClient::new(client)),
            api,
        })
    }
}
