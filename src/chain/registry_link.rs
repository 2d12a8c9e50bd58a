use std::sync::Arc;

use tonic::async_trait;
use tracing::debug;

use super::TargetRegistryLink;
use super::TerminalLink;
use super::WatchSink;
use crate::proto::Target;
use crate::resource::Resource;
use crate::storage::ResourceStore;
use crate::Result;

/// Applies registrations to a target store, then forwards.
///
/// A failed store write is returned to the caller and is not forwarded.
pub struct RegistryLink {
    store: Arc<dyn ResourceStore<Target>>,
    next: Arc<dyn TargetRegistryLink>,
}

impl RegistryLink {
    pub fn new(store: Arc<dyn ResourceStore<Target>>) -> Self {
        Self {
            store,
            next: Arc::new(TerminalLink),
        }
    }
}

#[async_trait]
impl TargetRegistryLink for RegistryLink {
    async fn register(
        &self,
        target: Target,
    ) -> Result<()> {
        debug!(target_id = %target.identity(), status = ?target.status(), "Register");
        self.store.set(target.clone())?;
        self.next.register(target).await
    }

    async fn unregister(
        &self,
        target: Target,
    ) -> Result<()> {
        debug!(target_id = %target.identity(), "Unregister");
        self.store.remove(&target)?;
        self.next.unregister(target).await
    }

    async fn watch(
        &self,
        filter: Option<Target>,
        sink: WatchSink,
    ) -> Result<()> {
        self.next.watch(filter, sink).await
    }

    fn set_next(
        &mut self,
        next: Arc<dyn TargetRegistryLink>,
    ) {
        self.next = next;
    }
}
