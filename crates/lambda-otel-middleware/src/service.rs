//! Tower service wrapping Lambda handlers with tracing instrumentation.

use std::task::{Context, Poll};
use std::time::Duration;

use lambda_runtime::LambdaEvent;
use opentelemetry_semantic_conventions::attribute::{CLOUD_PROVIDER, FAAS_NAME, FAAS_VERSION};
use otel_lifecycle::Flusher;
use tower::Service;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::cold_start::check_cold_start;
use crate::enrich::TraceFields;
use crate::extractor::TraceContextExtractor;
use crate::future::LambdaOtelFuture;

/// Service that instruments an inner Lambda handler.
///
/// Per invocation: extract the parent context from the event, open a span
/// with FaaS semantic attributes, attach trace-correlation fields, invoke
/// the inner service inside the span, and flush telemetry before the
/// response future resolves.
#[derive(Clone)]
pub struct LambdaOtelService<S, E> {
    inner: S,
    extractor: E,
    flusher: Option<Flusher>,
    flush_on_end: bool,
    flush_timeout: Duration,
}

impl<S, E> LambdaOtelService<S, E> {
    pub(crate) fn new(
        inner: S,
        extractor: E,
        flusher: Option<Flusher>,
        flush_on_end: bool,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            extractor,
            flusher,
            flush_on_end,
            flush_timeout,
        }
    }
}

impl<S, E, T> Service<LambdaEvent<T>> for LambdaOtelService<S, E>
where
    S: Service<LambdaEvent<T>>,
    S::Error: std::fmt::Display,
    E: TraceContextExtractor<T>,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = LambdaOtelFuture<S::Future, S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<T>) -> Self::Future {
        let (payload, lambda_ctx) = event.into_parts();

        let parent_context = self.extractor.extract_context(&payload);
        // Enrichment observes the context as it exists at invocation start:
        // no propagated parent means no trace fields on this invocation's
        // records, even though a fresh root span is exported below.
        let trace_fields = TraceFields::from_context(&parent_context);

        let is_cold_start = check_cold_start();
        let span_name = self.extractor.span_name(&payload, &lambda_ctx);

        let span = tracing::info_span!(
            "lambda.invoke",
            otel.name = %span_name,
            otel.kind = "server",
            otel.status_code = tracing::field::Empty,
            error.message = tracing::field::Empty,
            faas.trigger = %self.extractor.trigger_type(),
            faas.invocation_id = %lambda_ctx.request_id,
            faas.coldstart = is_cold_start,
            faas.name = tracing::field::Empty,
            faas.version = tracing::field::Empty,
            cloud.provider = tracing::field::Empty,
            trace_id = tracing::field::Empty,
            span_id = tracing::field::Empty,
            trace_flags = tracing::field::Empty,
            http.request.method = tracing::field::Empty,
            url.path = tracing::field::Empty,
            http.route = tracing::field::Empty,
            url.scheme = tracing::field::Empty,
            client.address = tracing::field::Empty,
            user_agent.original = tracing::field::Empty,
        );

        span.set_parent(parent_context);

        if let Some(fields) = &trace_fields {
            fields.record(&span);
        }

        self.extractor.record_attributes(&payload, &span);
        record_function_attributes(&span, &lambda_ctx);

        let event = LambdaEvent::new(payload, lambda_ctx);

        // Call the inner service without .instrument() so this future holds
        // the only span reference and can close it before flushing.
        let future = {
            let _guard = span.enter();
            self.inner.call(event)
        };

        LambdaOtelFuture::new(
            future,
            span,
            self.flusher.clone(),
            self.flush_on_end,
            self.flush_timeout,
        )
    }
}

fn record_function_attributes(span: &Span, ctx: &lambda_runtime::Context) {
    span.record(CLOUD_PROVIDER, "aws");
    span.record(FAAS_NAME, ctx.env_config.function_name.as_str());
    span.record(FAAS_VERSION, ctx.env_config.version.as_str());
}
