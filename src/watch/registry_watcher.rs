use std::sync::Weak;

use tokio::sync::watch;
use tracing::trace;

use crate::resource::ResourceKind;

/// Sending half of a watcher's single-slot delivery queue.
pub type SlotSender<R> = watch::Sender<Vec<R>>;

/// Receiving half of a watcher's single-slot delivery queue.
pub type SlotReceiver<R> = watch::Receiver<Vec<R>>;

/// Creates an empty delivery slot. The initial empty value counts as already
/// consumed, so the first delivery is the priming snapshot.
pub fn delivery_slot<R>() -> (SlotSender<R>, SlotReceiver<R>) {
    watch::channel(Vec::new())
}

pub(crate) trait Unregister: Send + Sync {
    fn unregister(
        &self,
        id: u64,
    );
}

/// Keeps a watcher registered with its dispatcher.
///
/// Dropping the guard marks the watcher stopped and removes it from the live
/// set before returning.
pub struct WatcherGuard {
    id: u64,
    kind: ResourceKind,
    dispatcher: Weak<dyn Unregister>,
}

impl WatcherGuard {
    pub(crate) fn new(
        id: u64,
        kind: ResourceKind,
        dispatcher: Weak<dyn Unregister>,
    ) -> Self {
        Self { id, kind, dispatcher }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.unregister(self.id);
        }
        trace!(watcher_id = self.id, kind = %self.kind, "Watcher unregistered via guard");
    }
}

/// A single subscription: the receiving end of a delivery slot plus the guard
/// that keeps it registered.
pub struct RegistryWatcher<R> {
    receiver: SlotReceiver<R>,
    guard: Option<WatcherGuard>,
    id: u64,
}

impl<R: Clone> RegistryWatcher<R> {
    pub fn new(
        receiver: SlotReceiver<R>,
        guard: WatcherGuard,
    ) -> Self {
        Self {
            receiver,
            id: guard.id(),
            guard: Some(guard),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next undelivered view.
    ///
    /// Returns `None` once the watcher was stopped or its store went away.
    pub async fn next(&mut self) -> Option<Vec<R>> {
        if self.guard.is_none() {
            return None;
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Takes the pending view without waiting, if there is one.
    pub fn try_next(&mut self) -> Option<Vec<R>> {
        if self.guard.is_none() {
            return None;
        }
        match self.receiver.has_changed() {
            Ok(true) => Some(self.receiver.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.guard.is_none()
    }

    /// Stops delivery and releases the subscription. Idempotent.
    pub fn stop(&mut self) {
        self.guard.take();
    }
}
