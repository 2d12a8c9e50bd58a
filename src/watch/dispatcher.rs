use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use tracing::trace;

use super::registry_watcher::Unregister;
use super::SlotSender;
use super::WatcherGuard;
use crate::metrics::ACTIVE_WATCHERS;
use crate::metrics::DISPATCHED_NOTIFICATIONS;
use crate::resource::ChangeEvent;
use crate::resource::Resource;

struct Watcher<R> {
    id: u64,
    selector: Option<R>,
    slot: SlotSender<R>,
    stopped: AtomicBool,
}

impl<R: Resource> Watcher<R> {
    fn view(
        &self,
        snapshot: &[R],
    ) -> Vec<R> {
        snapshot
            .iter()
            .filter(|candidate| R::matches(self.selector.as_ref(), candidate))
            .cloned()
            .collect()
    }
}

struct DispatcherInner<R> {
    watchers: DashMap<u64, Arc<Watcher<R>>>,
    next_id: AtomicU64,
}

impl<R: Resource> DispatcherInner<R> {
    fn release(
        &self,
        id: u64,
    ) -> bool {
        match self.watchers.remove(&id) {
            Some((_, watcher)) => {
                watcher.stopped.store(true, Ordering::Release);
                ACTIVE_WATCHERS.with_label_values(&[R::KIND.as_str()]).dec();
                true
            }
            None => false,
        }
    }
}

impl<R: Resource> Unregister for DispatcherInner<R> {
    fn unregister(
        &self,
        id: u64,
    ) {
        self.release(id);
    }
}

/// Live set of watchers for one resource kind.
///
/// Registration and removal go through a `DashMap`, so they never wait for a
/// dispatch in progress. Dispatch works on a copy of the live set taken at
/// the start of the round.
pub struct Dispatcher<R> {
    inner: Arc<DispatcherInner<R>>,
}

impl<R: Resource> Default for Dispatcher<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Dispatcher<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                watchers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Adds a watcher and primes its slot with `initial`.
    ///
    /// Callers hold the owning store's lock so no mutation can slip between
    /// computing `initial` and the watcher becoming visible to dispatch.
    pub fn register(
        &self,
        selector: Option<R>,
        slot: SlotSender<R>,
        initial: Vec<R>,
    ) -> WatcherGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        slot.send_replace(initial);

        let watcher = Arc::new(Watcher {
            id,
            selector,
            slot,
            stopped: AtomicBool::new(false),
        });
        self.inner.watchers.insert(id, watcher);
        ACTIVE_WATCHERS.with_label_values(&[R::KIND.as_str()]).inc();

        debug!(watcher_id = id, kind = R::KIND.as_str(), "Watcher registered");

        let inner: Arc<dyn Unregister> = self.inner.clone();
        WatcherGuard::new(id, R::KIND, Arc::downgrade(&inner))
    }

    /// Redelivers the filtered view of `snapshot` to every live watcher.
    ///
    /// A pending undelivered value is replaced, never queued behind. Watchers
    /// that were stopped are skipped; watchers whose receiver is gone are
    /// pruned here.
    pub fn dispatch(
        &self,
        event: ChangeEvent,
        snapshot: &[R],
    ) {
        if event.kind != R::KIND {
            return;
        }

        let live: Vec<Arc<Watcher<R>>> = self.inner.watchers.iter().map(|e| e.value().clone()).collect();

        let mut delivered = 0u64;
        for watcher in live {
            if watcher.stopped.load(Ordering::Acquire) {
                continue;
            }
            if watcher.slot.is_closed() {
                if self.inner.release(watcher.id) {
                    trace!(watcher_id = watcher.id, kind = %event.kind, "Pruned closed watcher");
                }
                continue;
            }
            watcher.slot.send_replace(watcher.view(snapshot));
            delivered += 1;
        }

        DISPATCHED_NOTIFICATIONS
            .with_label_values(&[event.kind.as_str()])
            .inc_by(delivered);
        trace!(kind = %event.kind, delivered, "Change event dispatched");
    }

    /// Number of watchers currently in the live set.
    pub fn len(&self) -> usize {
        self.inner.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.watchers.is_empty()
    }
}
