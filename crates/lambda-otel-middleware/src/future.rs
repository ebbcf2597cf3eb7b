//! Response future managing span closure and the end-of-invocation flush.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use opentelemetry_semantic_conventions::attribute::{ERROR_MESSAGE, OTEL_STATUS_CODE};
use otel_lifecycle::Flusher;
use pin_project::pin_project;
use tracing::Span;

/// Future wrapping an instrumented handler call.
///
/// Polls the inner future inside the invocation span, records OK/ERROR
/// status on completion, closes the span, and then — before resolving —
/// force-flushes pending telemetry through the [`Flusher`]. The execution
/// environment may freeze the process as soon as this future resolves, so
/// the handler result is withheld until the flush completes or times out.
/// The flush runs on the error path too.
#[pin_project]
pub struct LambdaOtelFuture<F, T, E> {
    #[pin]
    inner: F,
    flush: Option<Pin<Box<dyn Future<Output = ()> + Send>>>,
    span: Option<Span>,
    flusher: Option<Flusher>,
    flush_on_end: bool,
    flush_timeout: Duration,
    outcome: Option<Result<T, E>>,
}

impl<F, T, E> LambdaOtelFuture<F, T, E> {
    pub(crate) fn new(
        inner: F,
        span: Span,
        flusher: Option<Flusher>,
        flush_on_end: bool,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            inner,
            flush: None,
            span: Some(span),
            flusher,
            flush_on_end,
            flush_timeout,
            outcome: None,
        }
    }
}

impl<F, T, E> Future for LambdaOtelFuture<F, T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.outcome.is_none() {
            // Poll inside the span so child spans pick up the right parent.
            let polled = match this.span.as_ref() {
                Some(span) => {
                    let _guard = span.enter();
                    this.inner.poll(cx)
                }
                None => this.inner.poll(cx),
            };

            let result = match polled {
                Poll::Ready(result) => result,
                Poll::Pending => return Poll::Pending,
            };

            if let Some(span) = this.span.take() {
                match &result {
                    Ok(_) => {
                        span.record(OTEL_STATUS_CODE, "OK");
                    }
                    Err(error) => {
                        span.record(OTEL_STATUS_CODE, "ERROR");
                        span.record(ERROR_MESSAGE, error.to_string().as_str());
                    }
                }
                // The span must close here: the SDK only exports ended spans,
                // and the flush below would otherwise miss this one.
                drop(span);
            }

            match this.flusher.take() {
                Some(flusher) if *this.flush_on_end => {
                    let timeout = *this.flush_timeout;
                    *this.flush = Some(Box::pin(async move {
                        if tokio::time::timeout(timeout, flush_telemetry(flusher))
                            .await
                            .is_err()
                        {
                            tracing::warn!(
                                target: "otel_lifecycle",
                                "telemetry flush did not finish before the invocation deadline"
                            );
                        }
                    }));
                    *this.outcome = Some(result);
                }
                _ => return Poll::Ready(result),
            }
        }

        if let Some(flush) = this.flush.as_mut() {
            ready!(flush.as_mut().poll(cx));
            *this.flush = None;
        }

        Poll::Ready(
            this.outcome
                .take()
                .expect("outcome is set before the flush starts"),
        )
    }
}

async fn flush_telemetry(flusher: Flusher) {
    if let Err(error) = flusher.force_flush() {
        tracing::warn!(
            target: "otel_lifecycle",
            %error,
            "failed to flush telemetry before the environment may freeze"
        );
    }
}
