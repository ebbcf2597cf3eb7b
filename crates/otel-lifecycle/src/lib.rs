//! OpenTelemetry SDK configuration and lifecycle management.
//!
//! This crate wires the OpenTelemetry SDK, OTLP exporters, and the `tracing`
//! ecosystem into a single startup/shutdown path suited to AWS Lambda, where
//! the process may be frozen or reclaimed immediately after a response is
//! produced and buffered telemetry must be pushed out explicitly.
//!
//! # Lifecycle
//!
//! [`TelemetryBuilder::build`] resolves layered configuration, constructs the
//! span and log providers, installs the global tracer provider and the W3C
//! trace-context propagator, and initialises the tracing subscriber. Any
//! failure here is fatal to the caller: there is no degraded mode in which
//! serving invocations with a half-initialised pipeline makes sense.
//!
//! The returned [`TelemetryGuard`] hands out a [`Flusher`] capability for
//! per-invocation force-flushes, and guarantees an ordered shutdown: spans
//! are flushed and exported before the log sink is synced, on both the
//! explicit [`TelemetryGuard::shutdown`] path and the `Drop` path.
//!
//! # Example
//!
//! ```no_run
//! use otel_lifecycle::{TelemetryBuilder, TelemetryError};
//!
//! fn main() -> Result<(), TelemetryError> {
//!     let guard = TelemetryBuilder::new()
//!         .with_file("/var/task/otel-config.toml")
//!         .with_standard_env()
//!         .service_name("my-lambda")
//!         .build()?;
//!
//!     tracing::info!("telemetry pipeline running");
//!
//!     let flusher = guard.flusher();
//!     flusher.force_flush()?;
//!
//!     guard.shutdown()
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;
mod flusher;
mod guard;

pub use builder::TelemetryBuilder;
pub use config::{
    BatchConfig, EndpointConfig, Protocol, ResourceConfig, SignalConfig, TelemetryConfig,
};
pub use error::TelemetryError;
pub use flusher::Flusher;
pub use guard::TelemetryGuard;

// Re-export figment for callers who want to layer their own configuration.
pub use figment;
