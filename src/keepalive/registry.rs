use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use crate::metrics::ACTIVE_LEASES;
use crate::metrics::LEASE_EVICTIONS;
use crate::proto::target::Status;
use crate::proto::target::Type;
use crate::proto::Target;
use crate::resource::Resource;
use crate::storage::ResourceStore;
use crate::watch::SlotSender;
use crate::watch::WatcherGuard;
use crate::Error;
use crate::RegistryError;
use crate::Result;

/// Every target type a lease table has to cover on restore.
const TARGET_TYPES: [Type; 2] = [Type::Default, Type::Frontend];

#[derive(Debug)]
pub(super) struct Lease {
    pub(super) generation: u64,
    target: Target,
    cancel: CancellationToken,
}

pub(super) struct KeepAliveInner {
    store: Arc<dyn ResourceStore<Target>>,
    pub(super) leases: Mutex<HashMap<String, Lease>>,
    timeout: Duration,
    next_generation: AtomicU64,
    runtime: Handle,
}

impl KeepAliveInner {
    /// Installs a fresh lease for `target`, cancelling the one it replaces.
    fn arm(
        self: &Arc<Self>,
        leases: &mut HashMap<String, Lease>,
        target: Target,
    ) {
        let id = target.identity();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let lease = Lease {
            generation,
            target,
            cancel: cancel.clone(),
        };
        match leases.insert(id.clone(), lease) {
            Some(previous) => {
                previous.cancel.cancel();
                debug!(target_id = %id, generation, "Update/refresh lease");
            }
            None => {
                ACTIVE_LEASES.inc();
                debug!(target_id = %id, generation, "Register lease");
            }
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        let timeout = self.timeout;
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.expire(&id, generation);
                    }
                }
            }
        });
    }

    /// Evicts the target of lease `generation`. A failed store removal keeps
    /// the target under a fresh lease so that eviction is retried.
    pub(super) fn expire(
        self: &Arc<Self>,
        id: &str,
        generation: u64,
    ) {
        let mut leases = self.leases.lock();
        let target = match leases.get(id) {
            Some(lease) if lease.generation == generation => lease.target.clone(),
            current => {
                trace!(target_id = %id, generation, current = ?current.map(|l| l.generation), "Stale lease timer");
                return;
            }
        };

        info!(target_id = %id, timeout = ?self.timeout, "Lease expired, removing target");
        if let Err(e) = self.store.remove(&target) {
            error!(target_id = %id, "Failed to remove expired target, re-arming lease: {:?}", e);
            self.arm(&mut leases, target);
            return;
        }
        leases.remove(id);
        ACTIVE_LEASES.dec();
        LEASE_EVICTIONS.inc();
    }
}

impl Drop for KeepAliveInner {
    fn drop(&mut self) {
        let leases = self.leases.get_mut();
        for lease in leases.values() {
            lease.cancel.cancel();
        }
        ACTIVE_LEASES.sub(leases.len() as i64);
    }
}

/// Target store decorator enforcing keepalive leases.
///
/// Must be constructed inside a Tokio runtime; lease timers run on it.
#[derive(Clone)]
pub struct KeepAliveRegistry {
    pub(super) inner: Arc<KeepAliveInner>,
}

impl KeepAliveRegistry {
    /// Wraps `store` and rebuilds leases for the targets it already holds.
    ///
    /// # Errors
    /// Returns `RegistryError::LeaseRestore` if the wrapped store cannot be
    /// read, and `Error::Fatal` outside a Tokio runtime.
    pub fn new(
        store: Arc<dyn ResourceStore<Target>>,
        timeout: Duration,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Fatal(format!("keepalive registry needs a tokio runtime: {e}")))?;

        let registry = Self {
            inner: Arc::new(KeepAliveInner {
                store,
                leases: Mutex::new(HashMap::new()),
                timeout,
                next_generation: AtomicU64::new(1),
                runtime,
            }),
        };
        registry.restore()?;
        Ok(registry)
    }

    fn restore(&self) -> Result<()> {
        let mut leases = self.inner.leases.lock();
        for target_type in TARGET_TYPES {
            let filter = Target {
                status: Status::Any as i32,
                r#type: target_type as i32,
                ..Default::default()
            };
            let targets = self
                .inner
                .store
                .get(Some(filter))
                .map_err(|e| RegistryError::LeaseRestore(e.to_string()))?;
            for target in targets {
                self.inner.arm(&mut leases, target);
            }
        }
        info!(leases = leases.len(), "Restored keepalive leases");
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Number of targets currently holding a lease.
    pub fn lease_count(&self) -> usize {
        self.inner.leases.lock().len()
    }
}

impl ResourceStore<Target> for KeepAliveRegistry {
    /// A target without a lease is stored disabled, whatever status it asked
    /// for; it can only become enabled on a later refresh. A refresh asking
    /// for `ANY` keeps the status already stored.
    fn set(
        &self,
        mut value: Target,
    ) -> Result<()> {
        let id = value.identity();
        let mut leases = self.inner.leases.lock();
        match leases.get(&id) {
            None if value.status() != Status::Disabled => {
                debug!(target_id = %id, requested = ?value.status(), "First registration forced to disabled");
                value.set_status(Status::Disabled);
            }
            Some(lease) if value.status() == Status::Any => {
                value.status = lease.target.status;
            }
            _ => {}
        }
        self.inner.store.set(value.clone())?;
        self.inner.arm(&mut leases, value);
        Ok(())
    }

    fn remove(
        &self,
        value: &Target,
    ) -> Result<()> {
        let id = value.identity();
        let mut leases = self.inner.leases.lock();
        self.inner.store.remove(value)?;
        if let Some(lease) = leases.remove(&id) {
            lease.cancel.cancel();
            ACTIVE_LEASES.dec();
            debug!(target_id = %id, "Lease released");
        }
        Ok(())
    }

    fn get(
        &self,
        filter: Option<Target>,
    ) -> Result<Vec<Target>> {
        self.inner.store.get(filter)
    }

    fn subscribe(
        &self,
        filter: Option<Target>,
        slot: SlotSender<Target>,
    ) -> Result<WatcherGuard> {
        self.inner.store.subscribe(filter, slot)
    }
}
