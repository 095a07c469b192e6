//! Ordered release actions for resources acquired while a unit is loaded.

use futures::future::BoxFuture;
use futures::FutureExt;
use plughost_types::PluginId;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Boxed async release action.
pub type Release = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Wraps a closure returning a future into a [`Release`].
pub fn release<F, Fut>(action: F) -> Release
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || action().boxed())
}

/// Release actions run in insertion order. A failing action is logged and
/// the remaining ones still run.
#[derive(Default)]
pub struct DisposalStack {
    entries: Mutex<Vec<(String, Release)>>,
}

impl DisposalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F, Fut>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.entries().push((label.into(), release(action)));
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries().iter().map(|(l, _)| l.clone()).collect()
    }

    /// Runs and clears every entry. Returns the number of failures.
    pub async fn run(&self, plugin_id: &PluginId) -> usize {
        let entries = std::mem::take(&mut *self.entries());
        let mut failures = 0;
        for (label, action) in entries {
            match action().await {
                Ok(()) => debug!(plugin_id = %plugin_id, label = %label, "released"),
                Err(e) => {
                    failures += 1;
                    warn!(plugin_id = %plugin_id, label = %label, "release failed: {e:#}");
                }
            }
        }
        failures
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(String, Release)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DisposalStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalStack")
            .field("labels", &self.labels())
            .finish()
    }
}
