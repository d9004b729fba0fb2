use crate::config::Config;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "mailsentry=debug,tower_http=debug";

/// Flushes pending spans when dropped; hold it for the life of `main`.
pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        global::shutdown_tracer_provider();
    }
}

pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    init_tracing(config)?;
    init_metrics(config.metrics_port)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    // Traces leave the process only when a collector is configured.
    let otel_layer = match &config.otel_exporter_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", config.service_name.clone()),
                ])))
                .install_batch(runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    if let Some(endpoint) = &config.otel_exporter_endpoint {
        tracing::info!(endpoint = %endpoint, "Exporting traces over OTLP");
    }
    Ok(())
}

fn init_metrics(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    metrics::describe_counter!(
        "mailsentry_jobs_total",
        "Monitoring job runs by outcome (completed, failed, skipped)"
    );
    metrics::describe_counter!(
        "mailsentry_emails_classified_total",
        "Messages scored by the spam classifier, by label"
    );
    metrics::describe_counter!(
        "mailsentry_events_published_total",
        "Events delivered to at least one live subscriber"
    );
    metrics::describe_counter!(
        "mailsentry_events_dropped_total",
        "Events published while nobody was listening"
    );
    metrics::describe_gauge!(
        "mailsentry_stream_connections",
        "Open notification streams"
    );

    tracing::info!("Metrics exporter (Prometheus) started on port {}", port);
    Ok(())
}
