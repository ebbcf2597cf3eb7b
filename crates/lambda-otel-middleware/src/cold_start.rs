//! Cold start detection.

use std::sync::atomic::{AtomicBool, Ordering};

/// Set to `false` once the first invocation has been observed.
static IS_COLD_START: AtomicBool = AtomicBool::new(true);

/// Reports whether this invocation is the container's first, and clears the
/// flag.
///
/// Provisioned-concurrency containers are pre-warmed, so when
/// `AWS_LAMBDA_INITIALIZATION_TYPE` is `"provisioned-concurrency"` this
/// always reports `false`.
///
/// The atomic swap guarantees exactly one invocation observes `true`, even
/// when invocations race.
pub fn check_cold_start() -> bool {
    if std::env::var("AWS_LAMBDA_INITIALIZATION_TYPE")
        .map(|v| v == "provisioned-concurrency")
        .unwrap_or(false)
    {
        IS_COLD_START.store(false, Ordering::SeqCst);
        return false;
    }

    IS_COLD_START.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
pub(crate) fn reset_cold_start_for_testing() {
    IS_COLD_START.store(true, Ordering::SeqCst);
}
