use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::metrics::STORED_RESOURCES;
use crate::resource::ChangeEvent;
use crate::resource::Resource;
use crate::storage::ResourceStore;
use crate::watch::Dispatcher;
use crate::watch::SlotSender;
use crate::watch::WatcherGuard;
use crate::Result;

/// Volatile store. Values live only as long as the process.
///
/// Entries are keyed by identity in a `BTreeMap`, so `get` returns values in
/// identity order. Dispatch runs while the write lock is still held, which
/// keeps event order identical to mutation order for every watcher.
pub struct MemoryStore<R: Resource> {
    entries: RwLock<BTreeMap<String, R>>,
    dispatcher: Dispatcher<R>,
}

impl<R: Resource> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> MemoryStore<R> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Replaces the whole content with `values` in one step.
    ///
    /// Later duplicates of an identity win. Emits a single change event, and
    /// only when the content actually differs.
    pub fn replace_all(
        &self,
        values: Vec<R>,
    ) -> Result<()> {
        let replacement: BTreeMap<String, R> = values.into_iter().map(|v| (v.identity(), v)).collect();

        let mut entries = self.entries.write();
        if *entries == replacement {
            trace!(kind = R::KIND.as_str(), "replace_all without changes");
            return Ok(());
        }
        *entries = replacement;
        debug!(kind = R::KIND.as_str(), count = entries.len(), "Replaced all resources");
        self.emit(&entries);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn watcher_count(&self) -> usize {
        self.dispatcher.len()
    }

    fn emit(
        &self,
        entries: &BTreeMap<String, R>,
    ) {
        STORED_RESOURCES
            .with_label_values(&[R::KIND.as_str()])
            .set(entries.len() as i64);
        let snapshot: Vec<R> = entries.values().cloned().collect();
        self.dispatcher.dispatch(ChangeEvent::new(R::KIND), &snapshot);
    }

    fn select(
        entries: &BTreeMap<String, R>,
        filter: Option<&R>,
    ) -> Vec<R> {
        entries
            .values()
            .filter(|candidate| R::matches(filter, candidate))
            .cloned()
            .collect()
    }
}

impl<R: Resource> ResourceStore<R> for MemoryStore<R> {
    fn set(
        &self,
        value: R,
    ) -> Result<()> {
        let id = value.identity();
        let mut entries = self.entries.write();
        match entries.get_mut(&id) {
            Some(existing) => {
                let before = existing.clone();
                existing.merge(value);
                if *existing == before {
                    trace!(kind = R::KIND.as_str(), id = %id, "Set without changes");
                    return Ok(());
                }
                debug!(kind = R::KIND.as_str(), id = %id, "Updated resource");
            }
            None => {
                debug!(kind = R::KIND.as_str(), id = %id, "Added resource");
                entries.insert(id, value);
            }
        }
        self.emit(&entries);
        Ok(())
    }

    fn remove(
        &self,
        value: &R,
    ) -> Result<()> {
        let id = value.identity();
        let mut entries = self.entries.write();
        if entries.remove(&id).is_none() {
            trace!(kind = R::KIND.as_str(), id = %id, "Remove of unknown resource");
            return Ok(());
        }
        debug!(kind = R::KIND.as_str(), id = %id, "Removed resource");
        self.emit(&entries);
        Ok(())
    }

    fn get(
        &self,
        filter: Option<R>,
    ) -> Result<Vec<R>> {
        let entries = self.entries.read();
        Ok(Self::select(&entries, filter.as_ref()))
    }

    fn subscribe(
        &self,
        filter: Option<R>,
        slot: SlotSender<R>,
    ) -> Result<WatcherGuard> {
        let entries = self.entries.read();
        let initial = Self::select(&entries, filter.as_ref());
        Ok(self.dispatcher.register(filter, slot, initial))
    }
}
