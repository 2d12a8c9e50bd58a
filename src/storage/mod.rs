//! Resource stores.
//!
//! A store holds the authoritative identity -> value mapping for one kind,
//! emits a [`ChangeEvent`](crate::resource::ChangeEvent) after each committed
//! mutation and hands out primed watchers. Two backends satisfy the same
//! contract: [`MemoryStore`] keeps values in process memory, and
//! [`SledTargetStore`] persists targets in normalized sled trees.

mod memory;
mod sled_target_store;
pub use memory::*;
pub use sled_target_store::*;

#[cfg(test)]
mod sled_target_store_test;

#[cfg(test)]
use mockall::automock;

use crate::resource::Resource;
use crate::watch::delivery_slot;
use crate::watch::RegistryWatcher;
use crate::watch::SlotSender;
use crate::watch::WatcherGuard;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait ResourceStore<R: Resource>: Send + Sync + 'static {
    /// Upserts by identity. An existing value only takes the update's mutable
    /// fields. Emits a change event once the update is visible to `get`.
    fn set(
        &self,
        value: R,
    ) -> Result<()>;

    /// Deletes by identity. Absent values are not an error and emit nothing.
    fn remove(
        &self,
        value: &R,
    ) -> Result<()>;

    /// Every stored value matching `filter`; `None` returns everything.
    fn get(
        &self,
        filter: Option<R>,
    ) -> Result<Vec<R>>;

    /// Registers `slot` with the dispatcher and primes it with `get(filter)`
    /// atomically with respect to mutations.
    fn subscribe(
        &self,
        filter: Option<R>,
        slot: SlotSender<R>,
    ) -> Result<WatcherGuard>;

    /// Opens a primed watcher on a fresh delivery slot.
    fn watch(
        &self,
        filter: Option<R>,
    ) -> Result<RegistryWatcher<R>> {
        let (slot, receiver) = delivery_slot();
        let guard = self.subscribe(filter, slot)?;
        Ok(RegistryWatcher::new(receiver, guard))
    }
}
