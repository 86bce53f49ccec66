//! Operation observers.
//!
//! Every adapter call reports an [`OpEvent`] to the observer it was built
//! with. Observers are per adapter; nothing here is process-wide.

use std::fmt::Debug;

/// One adapter operation about to be delegated.
#[derive(Debug, Clone, Copy)]
pub struct OpEvent<'a> {
    /// Operation name, e.g. `"open_file"` or `"rename"`.
    pub op: &'static str,
    /// Paths involved, in argument order.
    pub paths: &'a [&'a str],
}

/// Receives adapter operation events.
pub trait Observer: Send + Sync + Debug {
    fn on_op(&self, event: &OpEvent<'_>);
}

/// Emits each event as a `tracing` debug record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_op(&self, event: &OpEvent<'_>) {
        tracing::debug!(op = event.op, paths = ?event.paths, "fs op");
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_op(&self, _event: &OpEvent<'_>) {}
}
