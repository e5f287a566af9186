use serde::Deserialize;
use service_core::error::AppError;
use service_core::observability::LogSettings;
use std::time::Duration;

pub const SERVICE_DIR: &str = "sewahub-frontend";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_session_idle_hours")]
    pub session_idle_hours: i64,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_session_idle_hours() -> i64 {
    24
}

#[derive(Deserialize, Clone)]
pub struct ApiSettings {
    /// Base URL of the SewaHub REST API, reachable from this process.
    pub base_url: String,
    /// Browser-facing base URL, used to resolve relative avatar paths.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn public_base(&self) -> &str {
        self.public_url.as_deref().unwrap_or(&self.base_url)
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    service_core::config::load_settings(SERVICE_DIR)
}
