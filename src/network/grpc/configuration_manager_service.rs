use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::trace;

use crate::proto::configuration_manager_server::ConfigurationManager;
use crate::proto::Attractor;
use crate::proto::AttractorResponse;
use crate::proto::Conduit;
use crate::proto::ConduitResponse;
use crate::proto::Flow;
use crate::proto::FlowResponse;
use crate::proto::Gateway;
use crate::proto::GatewayResponse;
use crate::proto::Stream as StreamResource;
use crate::proto::StreamResponse;
use crate::proto::Trench;
use crate::proto::TrenchResponse;
use crate::proto::Vip;
use crate::proto::VipResponse;
use crate::watch::delivery_slot;
use crate::watch::DeliverySlot;
use crate::watch::RegistryWatcher;
use crate::watch::SlotSender;
use crate::watch::TopologyResource;
use crate::watch::WatcherNotifier;

type ResponseStream<T> = Pin<Box<dyn Stream<Item = std::result::Result<T, Status>> + Send>>;

/// Streams topology views over gRPC, one watcher per call.
#[derive(Clone)]
pub struct ConfigurationManagerService {
    notifier: WatcherNotifier,
    stream_buffer: usize,
}

impl ConfigurationManagerService {
    pub fn new(
        notifier: WatcherNotifier,
        stream_buffer: usize,
    ) -> Self {
        Self {
            notifier,
            stream_buffer,
        }
    }

    /// Registers a watcher for `filter` and forwards every view it receives
    /// until the client goes away.
    fn open<R, T>(
        &self,
        filter: TopologyResource,
        wrap: fn(SlotSender<R>) -> DeliverySlot,
        respond: fn(Vec<R>) -> T,
    ) -> std::result::Result<Response<ResponseStream<T>>, Status>
    where
        R: Clone + Send + Sync + 'static,
        T: Send + 'static,
    {
        let kind = filter.kind();
        let (slot, receiver) = delivery_slot::<R>();
        let guard = self.notifier.register_watcher(Some(filter), Some(wrap(slot)))?;
        let mut watcher = RegistryWatcher::new(receiver, guard);
        let (sink, responses) = mpsc::channel(self.stream_buffer);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    view = watcher.next() => {
                        let Some(view) = view else { break };
                        if sink.send(Ok(respond(view))).await.is_err() {
                            break;
                        }
                    }
                    _ = sink.closed() => break,
                }
            }
            watcher.stop();
            trace!(watcher_id = watcher.id(), kind = %kind, "Topology watch ended");
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(responses))))
    }
}

#[tonic::async_trait]
impl ConfigurationManager for ConfigurationManagerService {
    type WatchTrenchStream = ResponseStream<TrenchResponse>;
    type WatchConduitStream = ResponseStream<ConduitResponse>;
    type WatchStreamStream = ResponseStream<StreamResponse>;
    type WatchFlowStream = ResponseStream<FlowResponse>;
    type WatchVipStream = ResponseStream<VipResponse>;
    type WatchAttractorStream = ResponseStream<AttractorResponse>;
    type WatchGatewayStream = ResponseStream<GatewayResponse>;

    /// Delivers a single trench per update; `None` when no trench matches.
    async fn watch_trench(
        &self,
        request: Request<Trench>,
    ) -> std::result::Result<Response<Self::WatchTrenchStream>, Status> {
        self.open(
            TopologyResource::Trench(request.into_inner()),
            DeliverySlot::Trench,
            |trenches| TrenchResponse {
                trench: trenches.into_iter().next(),
            },
        )
    }

    async fn watch_conduit(
        &self,
        request: Request<Conduit>,
    ) -> std::result::Result<Response<Self::WatchConduitStream>, Status> {
        self.open(
            TopologyResource::Conduit(request.into_inner()),
            DeliverySlot::Conduit,
            |conduits| ConduitResponse { conduits },
        )
    }

    async fn watch_stream(
        &self,
        request: Request<StreamResource>,
    ) -> std::result::Result<Response<Self::WatchStreamStream>, Status> {
        self.open(
            TopologyResource::Stream(request.into_inner()),
            DeliverySlot::Stream,
            |streams| StreamResponse { streams },
        )
    }

    async fn watch_flow(
        &self,
        request: Request<Flow>,
    ) -> std::result::Result<Response<Self::WatchFlowStream>, Status> {
        self.open(
            TopologyResource::Flow(request.into_inner()),
            DeliverySlot::Flow,
            |flows| FlowResponse { flows },
        )
    }

    async fn watch_vip(
        &self,
        request: Request<Vip>,
    ) -> std::result::Result<Response<Self::WatchVipStream>, Status> {
        self.open(
            TopologyResource::Vip(request.into_inner()),
            DeliverySlot::Vip,
            |vips| VipResponse { vips },
        )
    }

    async fn watch_attractor(
        &self,
        request: Request<Attractor>,
    ) -> std::result::Result<Response<Self::WatchAttractorStream>, Status> {
        self.open(
            TopologyResource::Attractor(request.into_inner()),
            DeliverySlot::Attractor,
            |attractors| AttractorResponse { attractors },
        )
    }

    async fn watch_gateway(
        &self,
        request: Request<Gateway>,
    ) -> std::result::Result<Response<Self::WatchGatewayStream>, Status> {
        self.open(
            TopologyResource::Gateway(request.into_inner()),
            DeliverySlot::Gateway,
            |gateways| GatewayResponse { gateways },
        )
    }
}
