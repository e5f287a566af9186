use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// JSON lines for log shipping, human-readable output otherwise.
    #[serde(default = "default_json")]
    pub json: bool,
    /// OTLP gRPC collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    true
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: default_json(),
            otlp_endpoint: None,
        }
    }
}

fn otlp_tracer(service_name: &str, endpoint: &str) -> anyhow::Result<sdktrace::Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to initialize OTLP tracer for '{}' at '{}': {}",
                service_name,
                endpoint,
                e
            )
        })
}

/// Installs the global subscriber. Must be called from within a tokio
/// runtime when an OTLP endpoint is configured.
pub fn init_tracing(service_name: &str, settings: &LogSettings) -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level));

    let telemetry = match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => Some(
            tracing_opentelemetry::layer().with_tracer(otlp_tracer(service_name, endpoint)?),
        ),
        None => None,
    };

    let json_layer = settings.json.then(|| {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .json()
            .flatten_event(true)
    });
    let text_layer = (!settings.json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        service = service_name,
        otlp = settings.otlp_endpoint.is_some(),
        "Tracing initialized"
    );
    Ok(())
}
