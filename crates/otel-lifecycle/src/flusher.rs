//! The force-flush capability handle.

use std::sync::Arc;

use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::error::TelemetryError;

/// A capability to force pending telemetry out of the process.
///
/// Obtained from [`TelemetryGuard::flusher`](crate::TelemetryGuard::flusher)
/// at startup and handed to the instrumentation layer, which flushes at the
/// end of every invocation: the Lambda execution environment may freeze the
/// process the moment a response is returned, so buffered spans and log
/// records must be pushed out first.
///
/// The handle is cheap to clone and safe to share across concurrent
/// invocations; it only ever reads the provider references.
#[derive(Clone)]
pub struct Flusher {
    tracer_provider: Option<Arc<SdkTracerProvider>>,
    logger_provider: Option<Arc<SdkLoggerProvider>>,
}

impl Flusher {
    pub(crate) fn new(
        tracer_provider: Option<Arc<SdkTracerProvider>>,
        logger_provider: Option<Arc<SdkLoggerProvider>>,
    ) -> Self {
        Self {
            tracer_provider,
            logger_provider,
        }
    }

    /// Forces an export of all pending spans, then all pending log records.
    ///
    /// Blocks until the exporters complete or hit their own request timeout.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure. The caller decides severity:
    /// per-invocation callers log and continue, shutdown treats it as fatal.
    pub fn force_flush(&self) -> Result<(), TelemetryError> {
        if let Some(provider) = &self.tracer_provider {
            provider.force_flush().map_err(TelemetryError::Flush)?;
        }

        if let Some(provider) = &self.logger_provider {
            provider.force_flush().map_err(TelemetryError::Flush)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Flusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flusher")
            .field("traces", &self.tracer_provider.is_some())
            .field("logs", &self.logger_provider.is_some())
            .finish()
    }
}
