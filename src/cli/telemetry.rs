//! Logging plus optional OTLP trace export.

use anyhow::{anyhow, Result};
use base64ct::{Base64, Encoding};
use opentelemetry::{
    global,
    propagation::TextMapCompositePropagator,
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    runtime::Tokio,
    trace::{Config, Tracer, TracerProvider},
    Resource,
};
use std::{collections::HashMap, env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

static TRACER_PROVIDER: OnceLock<TracerProvider> = OnceLock::new();

/// `key1=value1,key2=value2`; pairs without `=` are dropped.
fn parse_headers_env(headers_str: &str) -> HashMap<String, String> {
    headers_str
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Keys ending in `-bin` carry base64 values and become binary metadata.
fn headers_to_metadata(headers: &HashMap<String, String>) -> Result<MetadataMap> {
    let mut meta = MetadataMap::with_capacity(headers.len());

    for (k, v) in headers {
        let key_str = k.to_ascii_lowercase();

        if key_str.ends_with("-bin") {
            let bytes = Base64::decode_vec(v)
                .map_err(|e| anyhow!("failed to base64-decode value for key {key_str}: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(key_str.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {key_str}: {e}"))?;
            meta.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let key = MetadataKey::<Ascii>::from_bytes(key_str.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {key_str}: {e}"))?;
            let val: MetadataValue<Ascii> = v
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {key_str}: {e}"))?;
            meta.insert(key, val);
        }
    }

    Ok(meta)
}

fn normalize_endpoint(endpoint: String) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn init_tracer() -> Result<Tracer> {
    if let Ok(proto) = var("OTEL_EXPORTER_OTLP_PROTOCOL") {
        if proto != "grpc" {
            debug!("OTEL_EXPORTER_OTLP_PROTOCOL='{proto}' ignored: only grpc is supported");
        }
    }

    let endpoint = normalize_endpoint(
        var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string()),
    );

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .with_timeout(Duration::from_secs(3));

    if let Some(host) = endpoint
        .strip_prefix("https://")
        .and_then(|rest| rest.split('/').next())
        .and_then(|authority| authority.split(':').next())
    {
        let tls = ClientTlsConfig::new()
            .domain_name(host.to_string())
            .with_native_roots();
        builder = builder.with_tls_config(tls);
    }

    let headers = var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_headers_env(&raw))
        .unwrap_or_default();
    if !headers.is_empty() {
        builder = builder.with_metadata(headers_to_metadata(&headers)?);
    }

    let exporter = builder.build()?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(Config::default().with_resource(Resource::new(vec![
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", instance_id),
        ])))
        .build();

    if TRACER_PROVIDER.set(provider.clone()).is_err() {
        debug!("tracer provider already initialized");
    }

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber. OTLP export is enabled only when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// # Errors
/// Returns an error if the exporter or the subscriber cannot be initialized.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = init_tracer()?;
        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush pending spans. No-op when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_headers_env_handles_spacing_and_garbage() {
        assert!(parse_headers_env("").is_empty());

        let result = parse_headers_env("key1 = value1 ,malformed, key2=a=b");
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("key1"), Some(&"value1".to_string()));
        assert_eq!(result.get("key2"), Some(&"a=b".to_string()));
        assert!(!result.contains_key("malformed"));
    }

    #[test]
    fn headers_to_metadata_mixes_ascii_and_binary() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer token123".to_string());
        // "binary data"
        headers.insert("custom-bin".to_string(), "YmluYXJ5IGRhdGE=".to_string());

        let metadata = headers_to_metadata(&headers).unwrap();
        assert_eq!(metadata.len(), 2);
        assert!(metadata.get("authorization").is_some());
    }

    #[test]
    fn headers_to_metadata_rejects_invalid_base64() {
        let mut headers = HashMap::new();
        headers.insert("custom-bin".to_string(), "not-valid-base64!!!".to_string());

        let err = headers_to_metadata(&headers).unwrap_err();
        assert!(err.to_string().contains("failed to base64-decode"));
    }

    #[test]
    fn normalize_endpoint_defaults_to_https() {
        assert_eq!(
            normalize_endpoint("http://localhost:4317".to_string()),
            "http://localhost:4317"
        );
        assert_eq!(
            normalize_endpoint("collector.example.com:4317/".to_string()),
            "https://collector.example.com:4317"
        );
        assert_eq!(
            normalize_endpoint("https://collector.example.com/v1/traces".to_string()),
            "https://collector.example.com/v1/traces"
        );
    }

    #[test]
    fn shutdown_without_provider_is_noop() {
        shutdown_tracer();
    }
}
