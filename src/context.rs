//! Context tracking with change notification
//!
//! A context is a named target environment the active client operates
//! against. [`ContextManager`] wraps the container-client façade to track
//! the current context across calls: every listing recomputes the current
//! context and fires the change event exactly once per observed by-name
//! transition. Switching a context never fires the event directly; only
//! observation does, which keeps the "is this actually a change" decision
//! in one place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::error::RuntimeError;
use crate::facade::{CommandRunner, RunOptions};
use stevedore_client::{ContainerClient, ContextInspection, ContextRecord};

/// Disambiguate the current context from a listing: zero contexts means
/// none, exactly one is authoritative, and among many only the flagged one
/// counts (possibly none).
#[must_use]
pub fn current_of(records: &[ContextRecord]) -> Option<&ContextRecord> {
    match records {
        [] => None,
        [only] => Some(only),
        many => many.iter().find(|record| record.current),
    }
}

/// Records a by-name observation; returns whether it differs from the
/// previous one. Always refreshes the cache, even when unchanged.
fn note_transition(cache: &Mutex<Option<String>>, observed: Option<&str>) -> bool {
    let mut last = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let changed = last.as_deref() != observed;
    *last = observed.map(str::to_string);
    changed
}

type ContextObserver = Box<dyn Fn(Option<&ContextRecord>) + Send + Sync>;

// ============================================================================
// ContextManager
// ============================================================================

/// Tracks the active client's current context and notifies observers on
/// transitions.
///
/// The manager caches only the last observed context *name*; it holds no
/// ownership over backend state, and a removed context is reconciled by
/// the next listing.
pub struct ContextManager {
    runner: Arc<CommandRunner<dyn ContainerClient>>,
    last_observed: Mutex<Option<String>>,
    observers: Mutex<Vec<(u64, ContextObserver)>>,
    next_observer_id: AtomicU64,
}

impl ContextManager {
    #[must_use]
    pub fn new(runner: Arc<CommandRunner<dyn ContainerClient>>) -> Arc<Self> {
        Arc::new(Self {
            runner,
            last_observed: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
        })
    }

    /// Register a change observer, called with the new current context (or
    /// `None`) on every observed transition. Lives until the returned
    /// subscription is dropped.
    #[must_use]
    pub fn subscribe(
        self: &Arc<Self>,
        observer: impl Fn(Option<&ContextRecord>) + Send + Sync + 'static,
    ) -> ContextSubscription {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(observer)));
        ContextSubscription {
            manager: Arc::downgrade(self),
            id,
        }
    }

    /// List all contexts, then recompute the current one and fire the
    /// change event if it differs by name from the last observation.
    pub async fn get_contexts(
        &self,
        options: &RunOptions,
    ) -> Result<Vec<ContextRecord>, RuntimeError> {
        let records = self
            .runner
            .run_with_defaults(|client| client.list_contexts(), options)
            .await?;
        self.observe(&records);
        Ok(records)
    }

    /// The current context, or `None` when the backend reports no
    /// unambiguous one.
    pub async fn get_current_context(
        &self,
        options: &RunOptions,
    ) -> Result<Option<ContextRecord>, RuntimeError> {
        let records = self.get_contexts(options).await?;
        Ok(current_of(&records).cloned())
    }

    /// Switch the backend's current context, then re-observe so a real
    /// change is detected and the event fires as a side effect.
    pub async fn use_context(&self, name: &str, options: &RunOptions) -> Result<(), RuntimeError> {
        self.runner
            .run_with_defaults(|client| client.use_context(name), options)
            .await?;
        self.get_current_context(options).await?;
        Ok(())
    }

    /// Remove a context by name. The cache is not touched; the next
    /// listing reconciles.
    pub async fn remove_context(
        &self,
        name: &str,
        options: &RunOptions,
    ) -> Result<(), RuntimeError> {
        self.runner
            .run_with_defaults(|client| client.remove_context(name), options)
            .await
    }

    /// Detailed information for one context, or `None` when the backend
    /// reports nothing for that name.
    pub async fn inspect_context(
        &self,
        name: &str,
        options: &RunOptions,
    ) -> Result<Option<ContextInspection>, RuntimeError> {
        let names = vec![name.to_string()];
        let mut results = self
            .runner
            .run_with_defaults(|client| client.inspect_contexts(&names), options)
            .await?;
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(Some(results.remove(0)))
        }
    }

    fn observe(&self, records: &[ContextRecord]) {
        let current = current_of(records).cloned();
        let changed = note_transition(&self.last_observed, current.as_ref().map(|c| c.name.as_str()));
        if !changed {
            return;
        }

        debug!(
            context = current.as_ref().map_or("<none>", |c| c.name.as_str()),
            "current context changed"
        );
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, observer) in observers.iter() {
            observer(current.as_ref());
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(observer_id, _)| *observer_id != id);
    }
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("last_observed", &*self.last_observed.lock().unwrap_or_else(PoisonError::into_inner))
            .finish_non_exhaustive()
    }
}

/// Scoped observer registration; dropping it unregisters the observer.
#[derive(Debug)]
pub struct ContextSubscription {
    manager: Weak<ContextManager>,
    id: u64,
}

impl Drop for ContextSubscription {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.unsubscribe(self.id);
        }
    }
}
