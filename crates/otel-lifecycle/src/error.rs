//! Error types for telemetry configuration and lifecycle.

use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

/// Errors raised while configuring, running, or tearing down the telemetry
/// pipeline.
///
/// Construction-time variants (`Config`, `Figment`, the exporter variants,
/// `Subscriber`) are fatal: the process must not serve invocations with a
/// half-initialised pipeline. `Flush` and `Shutdown` returned from
/// [`TelemetryGuard::shutdown`](crate::TelemetryGuard::shutdown) are equally
/// fatal, since silently dropping telemetry at exit defeats the purpose of
/// the pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The resolved configuration is invalid.
    #[error("invalid telemetry configuration: {0}")]
    Config(String),

    /// Layered configuration could not be resolved.
    #[error("failed to resolve telemetry configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// The OTLP span exporter could not be constructed.
    #[error("failed to build span exporter: {0}")]
    SpanExporter(#[source] ExporterBuildError),

    /// The OTLP log exporter could not be constructed.
    #[error("failed to build log exporter: {0}")]
    LogExporter(#[source] ExporterBuildError),

    /// A provider failed to flush pending telemetry.
    #[error("failed to flush telemetry: {0}")]
    Flush(#[source] OTelSdkError),

    /// A provider failed to shut down cleanly.
    #[error("failed to shut down telemetry: {0}")]
    Shutdown(#[source] OTelSdkError),

    /// The global tracing subscriber could not be installed.
    #[error("failed to initialise tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

impl From<figment::Error> for TelemetryError {
    fn from(err: figment::Error) -> Self {
        TelemetryError::Figment(Box::new(err))
    }
}
