use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Locates `<service>/config` whether the process runs from the workspace
/// root or from inside the service directory.
pub fn configuration_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Loads `config/base.yaml` for a service and layers `APP_`-prefixed
/// environment variables on top (`APP_SERVER__PORT=9000`).
pub fn load_settings<T: DeserializeOwned>(service_dir: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    let directory = configuration_directory(&base_path, service_dir);

    let settings = Config::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
