//! Distributed tracing configuration.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use workbench_core::{config::TelemetryConfig, Error, Result};

const DEFAULT_FILTER: &str = "info,workbench=debug";
const SERVICE_NAME: &str = "workbench-gateway";

/// Configure stdout logging and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
/// OpenTelemetry export.
///
/// Fails if a global subscriber is already installed.
pub fn configure_tracing(config: &TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Exactly one of these is Some.
    let json_layer = config.json_logs.then(|| fmt::layer().json());
    let plain_layer = (!config.json_logs).then(fmt::layer);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer);

    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => {
            let provider = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint.clone()),
                )
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(
                    vec![KeyValue::new("service.name", SERVICE_NAME)],
                )))
                .install_batch(runtime::Tokio)
                .map_err(|e| Error::internal(format!("failed to install OTLP pipeline: {}", e)))?;

            let tracer = provider.tracer(SERVICE_NAME);
            opentelemetry::global::set_tracer_provider(provider);

            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .map_err(|e| Error::internal(format!("failed to install subscriber: {}", e)))?;
            tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
        }
        Err(_) => {
            registry
                .try_init()
                .map_err(|e| Error::internal(format!("failed to install subscriber: {}", e)))?;
        }
    }

    Ok(())
}
