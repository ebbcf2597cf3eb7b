//! Provider construction and lifecycle guard.

use std::sync::Arc;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig, WithTonicConfig};
use opentelemetry_sdk::logs::{
    BatchConfigBuilder as LogBatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider,
};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder as TraceBatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{Protocol, TelemetryConfig};
use crate::error::TelemetryError;
use crate::flusher::Flusher;

/// Owns the telemetry providers and guarantees ordered teardown.
///
/// Constructed by [`TelemetryBuilder::build`](crate::TelemetryBuilder::build).
/// On the happy path, call [`shutdown`](Self::shutdown) explicitly so flush
/// failures propagate; the `Drop` impl covers panics and early returns with a
/// best-effort teardown in the same order.
///
/// Teardown order matters: spans are flushed and exported before the log
/// sink is synced, so records produced during shutdown-adjacent processing
/// are still captured.
pub struct TelemetryGuard {
    tracer_provider: Option<Arc<SdkTracerProvider>>,
    logger_provider: Option<Arc<SdkLoggerProvider>>,
}

impl TelemetryGuard {
    /// Builds providers from resolved configuration, installs the global
    /// tracer provider and W3C trace-context propagator, and optionally
    /// installs the tracing subscriber.
    pub(crate) fn from_config(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let resource = build_resource(&config);

        let tracer_provider = if config.traces.enabled {
            Some(Arc::new(build_tracer_provider(&config, resource.clone())?))
        } else {
            None
        };

        let logger_provider = if config.logs.enabled {
            Some(Arc::new(build_logger_provider(&config, resource)?))
        } else {
            None
        };

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        if let Some(provider) = &tracer_provider {
            opentelemetry::global::set_tracer_provider(provider.as_ref().clone());
        }

        if config.init_tracing_subscriber {
            init_subscriber(&tracer_provider, &logger_provider)?;
        }

        Ok(Self {
            tracer_provider,
            logger_provider,
        })
    }

    /// Returns the force-flush capability for this pipeline.
    ///
    /// Available by construction: the SDK providers always support forced
    /// flush, so no runtime capability check is needed.
    pub fn flusher(&self) -> Flusher {
        Flusher::new(self.tracer_provider.clone(), self.logger_provider.clone())
    }

    /// Returns the tracer provider if traces are enabled.
    pub fn tracer_provider(&self) -> Option<&Arc<SdkTracerProvider>> {
        self.tracer_provider.as_ref()
    }

    /// Returns the logger provider if logs are enabled.
    pub fn logger_provider(&self) -> Option<&Arc<SdkLoggerProvider>> {
        self.logger_provider.as_ref()
    }

    /// Best-effort flush of both providers, warnings on failure.
    pub fn flush(&self) {
        if let Err(error) = self.flusher().force_flush() {
            tracing::warn!(target: "otel_lifecycle", %error, "failed to flush telemetry");
        }
    }

    /// Flushes and shuts down the pipeline: spans first, then logs.
    ///
    /// # Errors
    ///
    /// Returns the first flush or shutdown failure. By the time shutdown
    /// runs there is no further opportunity to recover, so callers should
    /// treat an error as fatal and exit abnormally.
    pub fn shutdown(mut self) -> Result<(), TelemetryError> {
        if let Some(provider) = self.tracer_provider.take() {
            provider.force_flush().map_err(TelemetryError::Flush)?;
            provider.shutdown().map_err(TelemetryError::Shutdown)?;
        }

        if let Some(provider) = self.logger_provider.take() {
            provider.force_flush().map_err(TelemetryError::Flush)?;
            provider.shutdown().map_err(TelemetryError::Shutdown)?;
        }

        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            let _ = provider.force_flush();
            if let Err(error) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {error}");
            }
        }

        if let Some(provider) = self.logger_provider.take() {
            let _ = provider.force_flush();
            if let Err(error) = provider.shutdown() {
                eprintln!("error shutting down logger provider: {error}");
            }
        }
    }
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    let mut attributes: Vec<KeyValue> = config
        .resource
        .attributes
        .iter()
        .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
        .collect();

    if let Some(name) = &config.resource.service_name {
        attributes.push(KeyValue::new("service.name", name.clone()));
    }

    if let Some(version) = &config.resource.service_version {
        attributes.push(KeyValue::new("service.version", version.clone()));
    }

    if let Some(env) = &config.resource.deployment_environment {
        attributes.push(KeyValue::new("deployment.environment.name", env.clone()));
    }

    Resource::builder().with_attributes(attributes).build()
}

fn export_metadata(config: &TelemetryConfig) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    for (key, value) in &config.endpoint.headers {
        if let (Ok(k), Ok(v)) = (
            key.parse::<MetadataKey<_>>(),
            value.parse::<MetadataValue<_>>(),
        ) {
            metadata.insert(k, v);
        }
    }
    metadata
}

fn build_tracer_provider(
    config: &TelemetryConfig,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = match config.endpoint.protocol {
        Protocol::Grpc => {
            let mut builder = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(config.effective_endpoint())
                .with_timeout(config.endpoint.timeout());

            if !config.endpoint.headers.is_empty() {
                builder = builder.with_metadata(export_metadata(config));
            }

            builder.build().map_err(TelemetryError::SpanExporter)?
        }
        protocol @ (Protocol::HttpBinary | Protocol::HttpJson) => {
            let mut builder = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(config.signal_endpoint("/v1/traces"))
                .with_timeout(config.endpoint.timeout())
                .with_protocol(http_protocol(protocol));

            if !config.endpoint.headers.is_empty() {
                builder = builder.with_headers(config.endpoint.headers.clone());
            }

            builder.build().map_err(TelemetryError::SpanExporter)?
        }
    };

    let batch_config = TraceBatchConfigBuilder::default()
        .with_max_queue_size(config.traces.batch.max_queue_size)
        .with_max_export_batch_size(config.traces.batch.max_export_batch_size)
        .with_scheduled_delay(config.traces.batch.scheduled_delay())
        .build();

    let span_processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build();

    Ok(SdkTracerProvider::builder()
        .with_span_processor(span_processor)
        .with_resource(resource)
        .build())
}

fn build_logger_provider(
    config: &TelemetryConfig,
    resource: Resource,
) -> Result<SdkLoggerProvider, TelemetryError> {
    let exporter = match config.endpoint.protocol {
        Protocol::Grpc => {
            let mut builder = opentelemetry_otlp::LogExporter::builder()
                .with_tonic()
                .with_endpoint(config.effective_endpoint())
                .with_timeout(config.endpoint.timeout());

            if !config.endpoint.headers.is_empty() {
                builder = builder.with_metadata(export_metadata(config));
            }

            builder.build().map_err(TelemetryError::LogExporter)?
        }
        protocol @ (Protocol::HttpBinary | Protocol::HttpJson) => {
            let mut builder = opentelemetry_otlp::LogExporter::builder()
                .with_http()
                .with_endpoint(config.signal_endpoint("/v1/logs"))
                .with_timeout(config.endpoint.timeout())
                .with_protocol(http_protocol(protocol));

            if !config.endpoint.headers.is_empty() {
                builder = builder.with_headers(config.endpoint.headers.clone());
            }

            builder.build().map_err(TelemetryError::LogExporter)?
        }
    };

    let batch_config = LogBatchConfigBuilder::default()
        .with_max_queue_size(config.logs.batch.max_queue_size)
        .with_max_export_batch_size(config.logs.batch.max_export_batch_size)
        .with_scheduled_delay(config.logs.batch.scheduled_delay())
        .build();

    let log_processor = BatchLogProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build();

    Ok(SdkLoggerProvider::builder()
        .with_log_processor(log_processor)
        .with_resource(resource)
        .build())
}

fn http_protocol(protocol: Protocol) -> opentelemetry_otlp::Protocol {
    match protocol {
        Protocol::HttpJson => opentelemetry_otlp::Protocol::HttpJson,
        _ => opentelemetry_otlp::Protocol::HttpBinary,
    }
}

fn init_subscriber(
    tracer_provider: &Option<Arc<SdkTracerProvider>>,
    logger_provider: &Option<Arc<SdkLoggerProvider>>,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .without_time();

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

    match (tracer_provider, logger_provider) {
        (Some(tp), Some(lp)) => {
            let tracer = tp.tracer("otel-lifecycle");
            let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let log_layer = OpenTelemetryTracingBridge::new(lp.as_ref());
            registry.with(telemetry_layer).with(log_layer).try_init()?;
        }
        (Some(tp), None) => {
            let tracer = tp.tracer("otel-lifecycle");
            let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            registry.with(telemetry_layer).try_init()?;
        }
        (None, Some(lp)) => {
            let log_layer = OpenTelemetryTracingBridge::new(lp.as_ref());
            registry.with(log_layer).try_init()?;
        }
        (None, None) => {
            registry.try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use opentelemetry::logs::{LogRecord as _, Logger as _, LoggerProvider as _};
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::error::OTelSdkResult;
    use opentelemetry_sdk::logs::{LogBatch, LogExporter};
    use opentelemetry_sdk::trace::{SpanData, SpanExporter};

    use super::*;
    use crate::config::SignalConfig;

    fn disabled_config() -> TelemetryConfig {
        TelemetryConfig {
            traces: SignalConfig {
                enabled: false,
                ..SignalConfig::default()
            },
            logs: SignalConfig {
                enabled: false,
                ..SignalConfig::default()
            },
            init_tracing_subscriber: false,
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn disabled_signals_build_no_providers() {
        let guard = TelemetryGuard::from_config(disabled_config()).unwrap();
        assert!(guard.tracer_provider().is_none());
        assert!(guard.logger_provider().is_none());
    }

    #[test]
    fn flusher_without_providers_is_a_no_op() {
        let guard = TelemetryGuard::from_config(disabled_config()).unwrap();
        guard.flusher().force_flush().unwrap();
    }

    #[test]
    fn shutdown_without_providers_succeeds() {
        let guard = TelemetryGuard::from_config(disabled_config()).unwrap();
        guard.shutdown().unwrap();
    }

    #[derive(Debug)]
    struct SpanFlushRecorder {
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpanExporter for SpanFlushRecorder {
        fn export(
            &self,
            batch: Vec<SpanData>,
        ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
            if !batch.is_empty() {
                self.order.lock().unwrap().push("spans");
            }
            std::future::ready(Ok(()))
        }
    }

    #[derive(Debug)]
    struct LogFlushRecorder {
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl LogExporter for LogFlushRecorder {
        fn export(
            &self,
            batch: LogBatch<'_>,
        ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
            if batch.iter().next().is_some() {
                self.order.lock().unwrap().push("logs");
            }
            std::future::ready(Ok(()))
        }
    }

    /// Providers over recording exporters, with scheduled exports pushed far
    /// enough out that only the explicit flush in `shutdown()` exports.
    fn recording_guard(order: &Arc<Mutex<Vec<&'static str>>>) -> TelemetryGuard {
        let span_processor = BatchSpanProcessor::builder(SpanFlushRecorder {
            order: order.clone(),
        })
        .with_batch_config(
            TraceBatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(60))
                .build(),
        )
        .build();
        let tracer_provider = SdkTracerProvider::builder()
            .with_span_processor(span_processor)
            .build();

        let log_processor = BatchLogProcessor::builder(LogFlushRecorder {
            order: order.clone(),
        })
        .with_batch_config(
            LogBatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(60))
                .build(),
        )
        .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_log_processor(log_processor)
            .build();

        TelemetryGuard {
            tracer_provider: Some(Arc::new(tracer_provider)),
            logger_provider: Some(Arc::new(logger_provider)),
        }
    }

    #[test]
    fn shutdown_flushes_spans_before_log_records() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let guard = recording_guard(&order);

        let tracer = guard.tracer_provider().unwrap().tracer("teardown-order");
        tracer.start("pending-span").end();

        let logger = guard.logger_provider().unwrap().logger("teardown-order");
        let mut record = logger.create_log_record();
        record.set_body("pending-record".into());
        logger.emit(record);

        guard.shutdown().unwrap();

        let order = order.lock().unwrap();
        let spans_at = order.iter().position(|label| *label == "spans");
        let logs_at = order.iter().position(|label| *label == "logs");
        assert!(spans_at.is_some(), "pending span never exported: {order:?}");
        assert!(
            logs_at.is_some(),
            "pending log record never exported: {order:?}"
        );
        assert!(
            spans_at.unwrap() < logs_at.unwrap(),
            "span flush must precede log sink sync: {order:?}"
        );
    }
}
