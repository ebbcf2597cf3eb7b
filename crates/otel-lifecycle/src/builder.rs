//! Layered configuration builder.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

use crate::config::{Protocol, TelemetryConfig};
use crate::error::TelemetryError;
use crate::guard::TelemetryGuard;

/// Builder resolving [`TelemetryConfig`] from layered sources and
/// constructing the [`TelemetryGuard`].
///
/// Later layers override earlier ones: defaults, then any TOML files, then
/// standard environment variables, then programmatic overrides.
///
/// # Example
///
/// ```no_run
/// use otel_lifecycle::{Protocol, TelemetryBuilder, TelemetryError};
///
/// # fn main() -> Result<(), TelemetryError> {
/// let guard = TelemetryBuilder::new()
///     .with_file("/var/task/otel-config.toml")
///     .with_standard_env()
///     .endpoint("http://collector:4318")
///     .protocol(Protocol::HttpBinary)
///     .service_name("my-lambda")
///     .build()?;
/// # drop(guard);
/// # Ok(())
/// # }
/// ```
#[must_use = "builders do nothing unless .build() is called"]
pub struct TelemetryBuilder {
    figment: Figment,
}

impl TelemetryBuilder {
    /// Creates a builder seeded with default settings.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(TelemetryConfig::default())),
        }
    }

    /// Layers a TOML configuration file. Missing files are silently skipped,
    /// so a fixed deployment path can be passed unconditionally.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.figment = self.figment.merge(Toml::file(path.as_ref()));
        self
    }

    /// Layers the standard `OTEL_*` environment variables:
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_EXPORTER_OTLP_PROTOCOL`, and
    /// `OTEL_SERVICE_NAME`. Other `OTEL_`-prefixed variables map onto config
    /// keys by lowercasing, with `__` separating nesting levels.
    pub fn with_standard_env(mut self) -> Self {
        let env = Env::prefixed("OTEL_")
            .map(|key| {
                let key = key.as_str();
                if key.eq_ignore_ascii_case("EXPORTER_OTLP_ENDPOINT") {
                    "endpoint__url".into()
                } else if key.eq_ignore_ascii_case("EXPORTER_OTLP_PROTOCOL") {
                    "endpoint__protocol".into()
                } else if key.eq_ignore_ascii_case("SERVICE_NAME") {
                    "resource__service_name".into()
                } else {
                    key.to_ascii_lowercase().into()
                }
            })
            .split("__");
        self.figment = self.figment.merge(env);
        self
    }

    /// Overrides the exporter endpoint URL.
    pub fn endpoint<S: Into<String>>(mut self, url: S) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("endpoint.url", url.into()));
        self
    }

    /// Overrides the OTLP transport protocol.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("endpoint.protocol", protocol));
        self
    }

    /// Sets the `service.name` resource attribute.
    pub fn service_name<S: Into<String>>(mut self, name: S) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("resource.service_name", name.into()));
        self
    }

    /// Sets the `service.version` resource attribute.
    pub fn service_version<S: Into<String>>(mut self, version: S) -> Self {
        self.figment = self.figment.merge(Serialized::default(
            "resource.service_version",
            version.into(),
        ));
        self
    }

    /// Sets the `deployment.environment.name` resource attribute.
    pub fn deployment_environment<S: Into<String>>(mut self, env: S) -> Self {
        self.figment = self.figment.merge(Serialized::default(
            "resource.deployment_environment",
            env.into(),
        ));
        self
    }

    /// Controls whether [`build`](Self::build) installs the global tracing
    /// subscriber. Defaults to `true`.
    pub fn init_tracing_subscriber(mut self, init: bool) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("init_tracing_subscriber", init));
        self
    }

    /// Resolves and validates the configuration without constructing
    /// providers.
    pub fn config(&self) -> Result<TelemetryConfig, TelemetryError> {
        let config: TelemetryConfig = self.figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configuration and constructs the telemetry pipeline.
    ///
    /// # Errors
    ///
    /// Any error here is fatal: configuration could not be resolved, an
    /// exporter could not be constructed, or the subscriber could not be
    /// installed. Callers must not serve invocations after a failure.
    pub fn build(self) -> Result<TelemetryGuard, TelemetryError> {
        let config = self.config()?;
        TelemetryGuard::from_config(config)
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_resolve() {
        let config = TelemetryBuilder::new().config().unwrap();
        assert!(config.traces.enabled);
        assert!(config.logs.enabled);
        assert!(config.endpoint.url.is_none());
        assert!(config.init_tracing_subscriber);
    }

    #[test]
    fn programmatic_overrides_apply() {
        let config = TelemetryBuilder::new()
            .endpoint("http://collector:4317")
            .protocol(Protocol::Grpc)
            .service_name("greeter")
            .service_version("1.2.3")
            .init_tracing_subscriber(false)
            .config()
            .unwrap();

        assert_eq!(config.endpoint.url.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.endpoint.protocol, Protocol::Grpc);
        assert_eq!(config.resource.service_name.as_deref(), Some("greeter"));
        assert_eq!(config.resource.service_version.as_deref(), Some("1.2.3"));
        assert!(!config.init_tracing_subscriber);
    }

    #[test]
    #[serial]
    fn standard_env_maps_onto_config() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318");
            jail.set_env("OTEL_EXPORTER_OTLP_PROTOCOL", "http/json");
            jail.set_env("OTEL_SERVICE_NAME", "greeter-from-env");

            let config = TelemetryBuilder::new()
                .with_standard_env()
                .config()
                .expect("config should resolve");

            assert_eq!(
                config.endpoint.url.as_deref(),
                Some("http://collector:4318")
            );
            assert_eq!(config.endpoint.protocol, Protocol::HttpJson);
            assert_eq!(
                config.resource.service_name.as_deref(),
                Some("greeter-from-env")
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn config_file_layers_under_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "otel-config.toml",
                r#"
                    [endpoint]
                    url = "http://from-file:4318"

                    [traces.batch]
                    scheduled_delay_millis = 250
                "#,
            )?;
            jail.set_env("OTEL_EXPORTER_OTLP_ENDPOINT", "http://from-env:4318");

            let config = TelemetryBuilder::new()
                .with_file("otel-config.toml")
                .with_standard_env()
                .config()
                .expect("config should resolve");

            // Environment wins over the file; file values not overridden stay.
            assert_eq!(config.endpoint.url.as_deref(), Some("http://from-env:4318"));
            assert_eq!(config.traces.batch.scheduled_delay_millis, 250);
            Ok(())
        });
    }

    #[test]
    fn invalid_endpoint_is_a_construction_error() {
        let err = TelemetryBuilder::new()
            .endpoint("collector:4318")
            .config()
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }
}
