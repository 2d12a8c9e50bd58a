use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tonic::async_trait;
use tonic::Status;

use crate::proto::Target;
use crate::proto::TargetResponse;
use crate::Result;

/// Outbound half of a watch stream.
pub type WatchSink = mpsc::Sender<std::result::Result<TargetResponse, Status>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetRegistryLink: Send + Sync + 'static {
    async fn register(
        &self,
        target: Target,
    ) -> Result<()>;

    async fn unregister(
        &self,
        target: Target,
    ) -> Result<()>;

    /// Serves a watch. Streaming links return once `sink` is closed.
    async fn watch(
        &self,
        filter: Option<Target>,
        sink: WatchSink,
    ) -> Result<()>;

    fn set_next(
        &mut self,
        next: Arc<dyn TargetRegistryLink>,
    );
}

/// End of every chain. Accepts all calls and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalLink;

#[async_trait]
impl TargetRegistryLink for TerminalLink {
    async fn register(
        &self,
        _target: Target,
    ) -> Result<()> {
        Ok(())
    }

    async fn unregister(
        &self,
        _target: Target,
    ) -> Result<()> {
        Ok(())
    }

    async fn watch(
        &self,
        _filter: Option<Target>,
        _sink: WatchSink,
    ) -> Result<()> {
        Ok(())
    }

    fn set_next(
        &mut self,
        _next: Arc<dyn TargetRegistryLink>,
    ) {
    }
}

/// Wires `links` in order and returns the head. An empty list yields the
/// terminal link.
pub fn build_chain(links: Vec<Box<dyn TargetRegistryLink>>) -> Arc<dyn TargetRegistryLink> {
    let mut next: Arc<dyn TargetRegistryLink> = Arc::new(TerminalLink);
    for mut link in links.into_iter().rev() {
        link.set_next(next);
        next = Arc::from(link);
    }
    next
}
