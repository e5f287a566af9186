use sewahub_frontend::config::get_configuration;
use sewahub_frontend::startup::build_router;
use sewahub_frontend::AppState;
use service_core::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("sewahub-frontend", &configuration.logging)?;

    let state = AppState::new(configuration.api.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?;

    let app = build_router(state, &configuration.server);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(api = %configuration.api.base_url, "Starting sewahub-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
