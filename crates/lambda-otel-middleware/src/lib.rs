//! Tower middleware instrumenting AWS Lambda handlers with OpenTelemetry.
//!
//! API Gateway delivers the W3C `traceparent` header nested inside a JSON
//! envelope rather than in a live request-header collection, so the standard
//! "extract from HTTP headers" instrumentation path never sees it. This crate
//! bridges that gap: a carrier adapter pulls the propagation header out of
//! the event, the middleware opens a span parented on the extracted context,
//! correlation fields are attached to every record logged during the
//! invocation, and pending telemetry is force-flushed before the response
//! future resolves — the execution environment may freeze the process the
//! moment control returns, so waiting for background export is not an option.
//!
//! # Usage
//!
//! ```no_run
//! use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
//! use lambda_otel_middleware::{ApiGatewayExtractor, LambdaOtelLayer};
//! use lambda_runtime::{LambdaEvent, Runtime};
//! use tower::ServiceBuilder;
//!
//! async fn handler(
//!     event: LambdaEvent<ApiGatewayProxyRequest>,
//! ) -> Result<ApiGatewayProxyResponse, lambda_runtime::Error> {
//!     tracing::info!("handling request");
//!     Ok(ApiGatewayProxyResponse::default())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     let guard = otel_lifecycle::TelemetryBuilder::new().build()?;
//!
//!     let layer = LambdaOtelLayer::builder(ApiGatewayExtractor::new())
//!         .flusher(guard.flusher())
//!         .build();
//!
//!     let service = ServiceBuilder::new().layer(layer).service_fn(handler);
//!     Runtime::new(service).run().await?;
//!
//!     guard.shutdown()?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod carrier;
mod cold_start;
mod enrich;
mod extractor;
mod future;
mod layer;
mod service;

pub use carrier::{extract_context, TraceparentCarrier, TRACEPARENT};
pub use cold_start::check_cold_start;
pub use enrich::TraceFields;
pub use extractor::{ApiGatewayExtractor, TraceContextExtractor};
pub use future::LambdaOtelFuture;
pub use layer::{LambdaOtelLayer, LambdaOtelLayerBuilder};
pub use service::LambdaOtelService;
