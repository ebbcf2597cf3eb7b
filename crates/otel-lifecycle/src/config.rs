//! Telemetry configuration model.
//!
//! The configuration is resolved by [`TelemetryBuilder`](crate::TelemetryBuilder)
//! from layered sources (defaults, optional TOML file, standard `OTEL_*`
//! environment variables, programmatic overrides) via figment.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

const DEFAULT_GRPC_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4318";

/// OTLP transport protocol.
///
/// Values follow the standard `OTEL_EXPORTER_OTLP_PROTOCOL` spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// OTLP over gRPC.
    #[serde(rename = "grpc")]
    Grpc,
    /// OTLP over HTTP with binary protobuf payloads.
    #[serde(rename = "http/protobuf", alias = "http-protobuf")]
    HttpBinary,
    /// OTLP over HTTP with JSON payloads.
    #[serde(rename = "http/json", alias = "http-json")]
    HttpJson,
}

/// Exporter endpoint settings shared by all signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Collector base URL. When unset, a protocol-specific localhost default
    /// is used (4317 for gRPC, 4318 for HTTP).
    pub url: Option<String>,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Per-export request timeout, in seconds. This is the bound the
    /// per-invocation force-flush ultimately relies on.
    pub timeout_secs: u64,
    /// Extra headers sent with every export request (collector credentials).
    pub headers: HashMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            protocol: Protocol::HttpBinary,
            timeout_secs: 10,
            headers: HashMap::new(),
        }
    }
}

impl EndpointConfig {
    /// The export request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch processor tuning for one signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of items buffered before drops occur.
    pub max_queue_size: usize,
    /// Maximum number of items exported in one request.
    pub max_export_batch_size: usize,
    /// Delay between scheduled exports, in milliseconds. Kept short by
    /// default: on Lambda the explicit end-of-invocation flush does the real
    /// work and long delays only grow the buffer.
    pub scheduled_delay_millis: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_millis: 1000,
        }
    }
}

impl BatchConfig {
    /// The scheduled export delay as a [`Duration`].
    pub fn scheduled_delay(&self) -> Duration {
        Duration::from_millis(self.scheduled_delay_millis)
    }
}

/// Per-signal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Whether the signal's provider is constructed at all.
    pub enabled: bool,
    /// Batch processor tuning.
    pub batch: BatchConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch: BatchConfig::default(),
        }
    }
}

/// Resource attributes attached to every exported span and log record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// `service.name`.
    pub service_name: Option<String>,
    /// `service.version`.
    pub service_version: Option<String>,
    /// `deployment.environment.name`.
    pub deployment_environment: Option<String>,
    /// Additional free-form resource attributes.
    pub attributes: BTreeMap<String, String>,
}

/// Fully resolved telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Exporter endpoint settings.
    pub endpoint: EndpointConfig,
    /// Resource attributes.
    pub resource: ResourceConfig,
    /// Trace signal settings.
    pub traces: SignalConfig,
    /// Log signal settings.
    pub logs: SignalConfig,
    /// Whether [`TelemetryGuard`](crate::TelemetryGuard) installs the global
    /// tracing subscriber. Disable when the host application owns subscriber
    /// setup.
    pub init_tracing_subscriber: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            resource: ResourceConfig::default(),
            traces: SignalConfig::default(),
            logs: SignalConfig::default(),
            init_tracing_subscriber: true,
        }
    }
}

impl TelemetryConfig {
    /// The exporter base endpoint: the configured URL, or the
    /// protocol-specific localhost default.
    pub fn effective_endpoint(&self) -> String {
        match &self.endpoint.url {
            Some(url) => url.clone(),
            None => match self.endpoint.protocol {
                Protocol::Grpc => DEFAULT_GRPC_ENDPOINT.to_string(),
                Protocol::HttpBinary | Protocol::HttpJson => DEFAULT_HTTP_ENDPOINT.to_string(),
            },
        }
    }

    /// The per-signal endpoint for HTTP transports, e.g.
    /// `signal_endpoint("/v1/traces")`.
    pub fn signal_endpoint(&self, path: &str) -> String {
        let base = self.effective_endpoint();
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Validates settings that figment cannot check structurally.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if let Some(url) = &self.endpoint.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(TelemetryError::Config(format!(
                "exporter endpoint must be an http(s) URL, got {url:?}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_follows_protocol() {
        let mut config = TelemetryConfig::default();
        assert_eq!(config.effective_endpoint(), "http://localhost:4318");

        config.endpoint.protocol = Protocol::Grpc;
        assert_eq!(config.effective_endpoint(), "http://localhost:4317");
    }

    #[test]
    fn configured_url_overrides_default() {
        let mut config = TelemetryConfig::default();
        config.endpoint.url = Some("http://collector:4318".to_string());
        assert_eq!(config.effective_endpoint(), "http://collector:4318");
    }

    #[test]
    fn signal_endpoint_handles_trailing_slash() {
        let mut config = TelemetryConfig::default();
        config.endpoint.url = Some("http://collector:4318/".to_string());
        assert_eq!(
            config.signal_endpoint("/v1/traces"),
            "http://collector:4318/v1/traces"
        );
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let mut config = TelemetryConfig::default();
        config.endpoint.url = Some("not-a-url".to_string());
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn validate_accepts_missing_endpoint() {
        assert!(TelemetryConfig::default().validate().is_ok());
    }

    #[test]
    fn protocol_parses_standard_spellings() {
        let grpc: Protocol = serde_json::from_str("\"grpc\"").unwrap();
        assert_eq!(grpc, Protocol::Grpc);

        let binary: Protocol = serde_json::from_str("\"http/protobuf\"").unwrap();
        assert_eq!(binary, Protocol::HttpBinary);

        let json: Protocol = serde_json::from_str("\"http/json\"").unwrap();
        assert_eq!(json, Protocol::HttpJson);
    }
}
