//! Shared node state.

use crate::api::DelegateRegistry;
use blob_store::BlobStore;
use delivery_queue::{
    BlobDelivery, BlobQueue, DeliveryQueue, HttpTransport, MessageDelivery, MessageQueue,
    RetryPolicy, Transport,
};
use event_dispatcher::EventDispatcher;
use exchange_config_and_utils::{Config, CoreResult, Paths, PeerRegistry};
use peer_identity::TlsContext;
use std::sync::Arc;

/// Everything the handlers need, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub paths: Arc<Paths>,
    /// This node's peer id, derived from its certificate.
    pub local_id: Arc<str>,
    pub tls: Arc<TlsContext>,
    pub peers: Arc<PeerRegistry>,
    pub dispatcher: Arc<EventDispatcher>,
    pub blobs: Arc<BlobStore>,
    pub messages: MessageQueue,
    pub transfers: BlobQueue,
    /// WebSocket connections waiting to become the event consumer.
    pub delegates: Arc<DelegateRegistry>,
}

impl AppState {
    pub fn build(config: Config, paths: Paths, tls: Arc<TlsContext>) -> CoreResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(tls.clone()));
        Self::with_transport(config, paths, tls, transport)
    }

    /// Build with a caller-supplied transport for outbound deliveries.
    pub fn with_transport(
        config: Config,
        paths: Paths,
        tls: Arc<TlsContext>,
        transport: Arc<dyn Transport>,
    ) -> CoreResult<Self> {
        let peers = Arc::new(PeerRegistry::load(paths.clone(), config.clone())?);
        let dispatcher = Arc::new(EventDispatcher::new(
            config.events.max_inflight,
            config.events.queue_size,
        ));
        let blobs = Arc::new(BlobStore::new(paths.blobs_dir()));
        let retry = RetryPolicy::from(&config.delivery);

        let messages = DeliveryQueue::new(
            "messages",
            MessageDelivery::new(transport.clone(), dispatcher.clone(), retry),
        );
        let transfers = DeliveryQueue::new(
            "blobs",
            BlobDelivery::new(transport, dispatcher.clone(), blobs.clone(), retry),
        );

        Ok(Self {
            local_id: Arc::from(tls.peer_id()),
            config: Arc::new(config),
            paths: Arc::new(paths),
            tls,
            peers,
            dispatcher,
            blobs,
            messages,
            transfers,
            delegates: Arc::new(DelegateRegistry::default()),
        })
    }
}
