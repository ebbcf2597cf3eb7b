//! Tower layer configuring the instrumentation service.

use std::time::Duration;

use otel_lifecycle::Flusher;
use tower::Layer;

use crate::service::LambdaOtelService;

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Layer adding OpenTelemetry instrumentation to a Lambda handler service.
///
/// Configured with an extractor for the event shape and, in production, the
/// [`Flusher`] obtained from the lifecycle guard at startup. Without a
/// flusher the span lifecycle still runs but nothing is flushed per
/// invocation — only appropriate when an external extension owns export.
///
/// # Example
///
/// ```ignore
/// let layer = LambdaOtelLayer::builder(ApiGatewayExtractor::new())
///     .flusher(guard.flusher())
///     .flush_timeout(Duration::from_secs(3))
///     .build();
/// ```
#[derive(Clone)]
pub struct LambdaOtelLayer<E> {
    extractor: E,
    flusher: Option<Flusher>,
    flush_on_end: bool,
    flush_timeout: Duration,
}

impl<E> LambdaOtelLayer<E> {
    /// Creates a layer with default settings and no flusher.
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            flusher: None,
            flush_on_end: true,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Creates a builder for detailed configuration.
    pub fn builder(extractor: E) -> LambdaOtelLayerBuilder<E> {
        LambdaOtelLayerBuilder::new(extractor)
    }
}

impl<S, E> Layer<S> for LambdaOtelLayer<E>
where
    E: Clone,
{
    type Service = LambdaOtelService<S, E>;

    fn layer(&self, inner: S) -> Self::Service {
        LambdaOtelService::new(
            inner,
            self.extractor.clone(),
            self.flusher.clone(),
            self.flush_on_end,
            self.flush_timeout,
        )
    }
}

/// Builder for [`LambdaOtelLayer`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct LambdaOtelLayerBuilder<E> {
    extractor: E,
    flusher: Option<Flusher>,
    flush_on_end: bool,
    flush_timeout: Duration,
}

impl<E> LambdaOtelLayerBuilder<E> {
    /// Creates a builder with the given extractor.
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            flusher: None,
            flush_on_end: true,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Sets the flush capability used at the end of every invocation.
    pub fn flusher(mut self, flusher: Flusher) -> Self {
        self.flusher = Some(flusher);
        self
    }

    /// Controls whether telemetry is flushed after each invocation.
    /// Defaults to `true`; disable only when an extension owns flushing.
    pub fn flush_on_end(mut self, flush: bool) -> Self {
        self.flush_on_end = flush;
        self
    }

    /// Bounds the end-of-invocation flush. Defaults to 5 seconds; the
    /// exporter's own request timeout bounds the underlying export call.
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Builds the configured layer.
    pub fn build(self) -> LambdaOtelLayer<E> {
        LambdaOtelLayer {
            extractor: self.extractor,
            flusher: self.flusher,
            flush_on_end: self.flush_on_end,
            flush_timeout: self.flush_timeout,
        }
    }
}
