//! Trace-correlation fields for structured log records.

use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use tracing::Span;

/// The three fixed correlation fields attached to every record emitted
/// during an instrumented invocation.
///
/// Derived from the span context as it exists at invocation start. The
/// per-invocation [`tracing::Span`] they are recorded onto is the derived
/// sink: the process-wide subscriber is never touched, and concurrent
/// invocations each own their own span, so records can never carry another
/// invocation's identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFields {
    /// Trace identifier, 32 lowercase hex characters.
    pub trace_id: String,
    /// Span identifier, 16 lowercase hex characters.
    pub span_id: String,
    /// Trace flags in their standard two-character hex form (`01` sampled).
    pub trace_flags: String,
}

impl TraceFields {
    /// Derives correlation fields from an execution context.
    ///
    /// Returns `None` when the context carries no valid span — the absent or
    /// malformed propagation-header case. Callers then leave the sink
    /// untouched; this is a defined state, not an error.
    pub fn from_context(cx: &Context) -> Option<Self> {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return None;
        }

        Some(Self {
            trace_id: span_context.trace_id().to_string(),
            span_id: span_context.span_id().to_string(),
            trace_flags: format!("{:02x}", span_context.trace_flags().to_u8()),
        })
    }

    /// Records the fields onto a span declared with empty `trace_id`,
    /// `span_id`, and `trace_flags` fields.
    pub fn record(&self, span: &Span) {
        span.record("trace_id", self.trace_id.as_str());
        span.record("span_id", self.span_id.as_str());
        span.record("trace_flags", self.trace_flags.as_str());
    }
}
