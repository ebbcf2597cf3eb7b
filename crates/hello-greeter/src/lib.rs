//! API Gateway greeting handler with trace propagation and per-invocation
//! telemetry flushing.
//!
//! The handler greets the caller by source IP and emits INFO records that,
//! when the invocation carries a `traceparent` header, are correlated with
//! the upstream trace. Telemetry is force-flushed before each response is
//! returned because the execution environment may freeze the process
//! immediately afterwards.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use lambda_otel_middleware::{ApiGatewayExtractor, LambdaOtelLayer};
use lambda_runtime::{Error, LambdaEvent};
use otel_lifecycle::{TelemetryBuilder, TelemetryError, TelemetryGuard};
use tower::{service_fn, Service, ServiceBuilder};

/// Greets the caller by the source IP recorded in the request context.
///
/// An absent or empty source IP falls back to a generic greeting. Always
/// responds with status 200; the request itself cannot fail.
pub async fn greeting_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    tracing::info!("handling greeting request");

    let source_ip = event
        .payload
        .request_context
        .identity
        .source_ip
        .filter(|ip| !ip.is_empty());

    let body = match &source_ip {
        Some(ip) => format!("Hello, {ip}!\n"),
        None => "Hello, world!\n".to_string(),
    };

    tracing::info!(
        client_ip = source_ip.as_deref().unwrap_or("unknown"),
        "greeting prepared"
    );

    Ok(ApiGatewayProxyResponse {
        status_code: 200,
        body: Some(Body::Text(body)),
        ..Default::default()
    })
}

/// Builds the telemetry pipeline for this function.
///
/// Layering, weakest to strongest: package defaults, the deployed
/// `otel-config.toml`, then standard `OTEL_*` environment variables.
///
/// # Errors
///
/// Fatal. A function that cannot construct its pipeline must not serve
/// invocations, so the caller should exit and let the platform surface an
/// init error.
pub fn init_telemetry() -> Result<TelemetryGuard, TelemetryError> {
    TelemetryBuilder::new()
        .service_name(env!("CARGO_PKG_NAME"))
        .service_version(env!("CARGO_PKG_VERSION"))
        .with_file("/var/task/otel-config.toml")
        .with_standard_env()
        .build()
}

/// Assembles the instrumented handler service.
///
/// The middleware extracts the propagated context from each event, wraps the
/// handler in a server span, and flushes through the guard's [`Flusher`]
/// before every response resolves.
///
/// [`Flusher`]: otel_lifecycle::Flusher
pub fn greeting_service(
    guard: &TelemetryGuard,
) -> impl Service<
    LambdaEvent<ApiGatewayProxyRequest>,
    Response = ApiGatewayProxyResponse,
    Error = Error,
> + Clone {
    let layer = LambdaOtelLayer::builder(ApiGatewayExtractor::new())
        .flusher(guard.flusher())
        .build();

    ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(greeting_handler))
}
