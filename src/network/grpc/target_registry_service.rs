use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;
use tracing::warn;

use crate::chain::TargetRegistryLink;
use crate::proto::target_registry_server::TargetRegistry;
use crate::proto::Empty;
use crate::proto::Target;
use crate::proto::TargetResponse;

pub type TargetResponseStream = Pin<Box<dyn Stream<Item = std::result::Result<TargetResponse, Status>> + Send>>;

/// Adapts the target registry chain to the generated gRPC service.
#[derive(Clone)]
pub struct TargetRegistryService {
    chain: Arc<dyn TargetRegistryLink>,
    stream_buffer: usize,
}

impl TargetRegistryService {
    pub fn new(
        chain: Arc<dyn TargetRegistryLink>,
        stream_buffer: usize,
    ) -> Self {
        Self { chain, stream_buffer }
    }
}

#[tonic::async_trait]
impl TargetRegistry for TargetRegistryService {
    async fn register(
        &self,
        request: Request<Target>,
    ) -> std::result::Result<Response<Empty>, Status> {
        self.chain.register(request.into_inner()).await?;
        Ok(Response::new(Empty {}))
    }

    async fn unregister(
        &self,
        request: Request<Target>,
    ) -> std::result::Result<Response<Empty>, Status> {
        self.chain.unregister(request.into_inner()).await?;
        Ok(Response::new(Empty {}))
    }

    type WatchStream = TargetResponseStream;

    /// The stream ends when the chain stops serving; the chain stops when
    /// the client drops the stream.
    async fn watch(
        &self,
        request: Request<Target>,
    ) -> std::result::Result<Response<Self::WatchStream>, Status> {
        let filter = request.into_inner();
        let (sink, responses) = mpsc::channel(self.stream_buffer);
        let chain = self.chain.clone();

        debug!(filter = ?filter, "Target watch requested");
        tokio::spawn(async move {
            let errors = sink.clone();
            if let Err(e) = chain.watch(Some(filter), sink).await {
                warn!("Target watch failed: {:?}", e);
                let _ = errors.send(Err(e.into())).await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(responses))))
    }
}
