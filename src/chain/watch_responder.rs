use std::sync::Arc;

use tonic::async_trait;
use tracing::debug;
use tracing::trace;

use super::TargetRegistryLink;
use super::TerminalLink;
use super::WatchSink;
use crate::proto::Target;
use crate::proto::TargetResponse;
use crate::storage::ResourceStore;
use crate::Result;

/// Streams the filtered target view to a watch caller.
///
/// The watch is forwarded first, then the link opens a watcher on its store
/// and pushes every new view into the sink until the caller goes away.
pub struct WatchResponderLink {
    store: Arc<dyn ResourceStore<Target>>,
    next: Arc<dyn TargetRegistryLink>,
}

impl WatchResponderLink {
    pub fn new(store: Arc<dyn ResourceStore<Target>>) -> Self {
        Self {
            store,
            next: Arc::new(TerminalLink),
        }
    }
}

#[async_trait]
impl TargetRegistryLink for WatchResponderLink {
    async fn register(
        &self,
        target: Target,
    ) -> Result<()> {
        self.next.register(target).await
    }

    async fn unregister(
        &self,
        target: Target,
    ) -> Result<()> {
        self.next.unregister(target).await
    }

    async fn watch(
        &self,
        filter: Option<Target>,
        sink: WatchSink,
    ) -> Result<()> {
        self.next.watch(filter.clone(), sink.clone()).await?;

        let mut watcher = self.store.watch(filter)?;
        debug!(watcher_id = watcher.id(), "Target watch started");

        loop {
            tokio::select! {
                view = watcher.next() => {
                    let Some(targets) = view else {
                        trace!(watcher_id = watcher.id(), "Watcher closed by store");
                        break;
                    };
                    if sink.send(Ok(TargetResponse { targets })).await.is_err() {
                        break;
                    }
                }
                _ = sink.closed() => break,
            }
        }

        watcher.stop();
        debug!(watcher_id = watcher.id(), "Target watch ended");
        Ok(())
    }

    fn set_next(
        &mut self,
        next: Arc<dyn TargetRegistryLink>,
    ) {
        self.next = next;
    }
}
