//! Extractor seam between event payloads and the instrumentation layer.

use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use lambda_runtime::Context as LambdaContext;
use opentelemetry::Context;
use opentelemetry_semantic_conventions::attribute::{
    CLIENT_ADDRESS, HTTP_REQUEST_METHOD, HTTP_ROUTE, URL_PATH, URL_SCHEME, USER_AGENT_ORIGINAL,
};
use tracing::Span;

use crate::carrier::{extract_context, TraceparentCarrier};

/// Extracts trace context and span metadata from Lambda event payloads.
///
/// The instrumentation layer is generic over this trait so that event shapes
/// with differently-located propagation headers can supply their own carrier
/// construction, and so tests can inject a fake.
pub trait TraceContextExtractor<T>: Clone + Send + Sync + 'static {
    /// Extracts the parent context for the invocation span.
    ///
    /// Returns a context with an invalid span context when the event carries
    /// no usable propagation header; the layer then starts a fresh root.
    fn extract_context(&self, payload: &T) -> Context;

    /// The FaaS trigger type recorded on the span (`"http"`, `"pubsub"`, ...).
    fn trigger_type(&self) -> &'static str;

    /// The span name, `"{method} {route}"` for HTTP triggers; falls back to
    /// the function name from the Lambda context.
    fn span_name(&self, payload: &T, lambda_ctx: &LambdaContext) -> String;

    /// Records event-specific semantic attributes on the invocation span.
    fn record_attributes(&self, payload: &T, span: &Span);
}

/// Extractor for API Gateway REST API (proxy) events.
///
/// Builds a [`TraceparentCarrier`] from the event's nested header map and
/// runs the globally configured propagator over it. The carrier derives
/// solely from the event: no environment fallbacks, no state shared across
/// invocations.
#[derive(Clone, Debug, Default)]
pub struct ApiGatewayExtractor;

impl ApiGatewayExtractor {
    /// Creates a new extractor.
    ///
    /// Configure the propagator via
    /// `opentelemetry::global::set_text_map_propagator` (the lifecycle guard
    /// installs the W3C propagator at startup).
    pub fn new() -> Self {
        Self
    }
}

impl TraceContextExtractor<ApiGatewayProxyRequest> for ApiGatewayExtractor {
    fn extract_context(&self, payload: &ApiGatewayProxyRequest) -> Context {
        extract_context(&TraceparentCarrier::from_event(payload))
    }

    fn trigger_type(&self) -> &'static str {
        "http"
    }

    fn span_name(&self, payload: &ApiGatewayProxyRequest, lambda_ctx: &LambdaContext) -> String {
        let method = payload.http_method.as_str();

        // Prefer the resource pattern for a low-cardinality name.
        let route = payload
            .resource
            .as_deref()
            .or(payload.path.as_deref())
            .unwrap_or(&lambda_ctx.env_config.function_name);

        format!("{} {}", method, route)
    }

    fn record_attributes(&self, payload: &ApiGatewayProxyRequest, span: &Span) {
        span.record(HTTP_REQUEST_METHOD, payload.http_method.as_str());
        span.record(URL_SCHEME, "https");

        if let Some(path) = &payload.path {
            span.record(URL_PATH, path.as_str());
        }

        if let Some(resource) = &payload.resource {
            span.record(HTTP_ROUTE, resource.as_str());
        }

        if let Some(ip) = &payload.request_context.identity.source_ip {
            span.record(CLIENT_ADDRESS, ip.as_str());
        }

        if let Some(ua) = payload.headers.get("user-agent")
            && let Ok(ua) = ua.to_str()
        {
            span.record(USER_AGENT_ORIGINAL, ua);
        }
    }
}
