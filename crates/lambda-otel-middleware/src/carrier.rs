//! Carrier adapter: from an API Gateway event to a propagation carrier.
//!
//! The generic instrumentation path expects propagation headers in a live
//! request-header collection. Lambda events carry them one level deeper,
//! inside the JSON envelope's `headers` map, so extraction needs a custom
//! carrier built per invocation from that event alone.

use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use opentelemetry::propagation::Extractor;
use opentelemetry::Context;

/// Canonical (lowercase) name of the W3C trace-context propagation header.
pub const TRACEPARENT: &str = "traceparent";

/// A propagation carrier holding exactly one entry: the canonicalized
/// `traceparent` header from one invocation's event.
///
/// An absent or non-UTF-8 header yields an empty-string entry rather than a
/// missing one; the propagator treats an empty value as "no parent context",
/// never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceparentCarrier {
    traceparent: String,
}

impl TraceparentCarrier {
    /// Builds the carrier from a decoded API Gateway event.
    pub fn from_event(event: &ApiGatewayProxyRequest) -> Self {
        let traceparent = event
            .headers
            .get(TRACEPARENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        Self { traceparent }
    }

    /// Builds the carrier from a raw event payload.
    ///
    /// Malformed or partial JSON never aborts the invocation: the payload is
    /// replaced with an empty event and extraction proceeds without a parent
    /// context. Decode failures are logged at DEBUG.
    pub fn from_slice(payload: &[u8]) -> Self {
        let event: ApiGatewayProxyRequest = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(%error, "event payload did not decode; continuing without trace context");
                ApiGatewayProxyRequest::default()
            }
        };

        Self::from_event(&event)
    }

    /// The raw `traceparent` value, empty when the event carried none.
    pub fn value(&self) -> &str {
        &self.traceparent
    }
}

impl Extractor for TraceparentCarrier {
    fn get(&self, key: &str) -> Option<&str> {
        key.eq_ignore_ascii_case(TRACEPARENT)
            .then_some(self.traceparent.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        vec![TRACEPARENT]
    }
}

/// Runs the globally configured propagator's extract operation over the
/// carrier.
///
/// An empty or malformed `traceparent` yields a context whose span context
/// reports invalid — a defined state for the enricher and the span builder,
/// which start a fresh root instead.
pub fn extract_context(carrier: &TraceparentCarrier) -> Context {
    opentelemetry::global::get_text_map_propagator(|propagator| propagator.extract(carrier))
}
