use std::{sync::Arc, time::Duration};

use pulsechat_auth::AuthProvider;
use pulsechat_presence::PresenceStore;
use pulsechat_store::MessageStore;

use crate::{
    delivery::DeliveryEngine, heartbeat::HeartbeatController, offline_flush::OfflineFlushEngine,
    registry::ConnectionRegistry, router::Router,
};

/// Shared gateway runtime state, wired once at startup and handed to every
/// connection as an `Arc`. Generalizes the teacher's `GatewayState`, which
/// bundled a client map, sequence counter, and domain services behind one
/// struct in the same way.
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<dyn PresenceStore>,
    pub store: Arc<dyn MessageStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub heartbeat: Arc<HeartbeatController>,
    pub delivery: Arc<DeliveryEngine>,
    pub offline_flush: Arc<OfflineFlushEngine>,
    pub router: Arc<Router>,
    pub hostname: String,
    pub version: String,
}

impl GatewayState {
    pub fn new(
        max_connections_per_user: usize,
        presence: Arc<dyn PresenceStore>,
        store: Arc<dyn MessageStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new(max_connections_per_user));
        let heartbeat = Arc::new(HeartbeatController::new(Arc::clone(&presence)));
        let delivery = Arc::new(DeliveryEngine::new(
            Arc::clone(&registry),
            Arc::clone(&presence),
            Arc::clone(&store),
            Arc::clone(&heartbeat),
        ));
        let offline_flush = Arc::new(OfflineFlushEngine::new(Arc::clone(&presence), Arc::clone(&store)));
        let router = Arc::new(Router::new(Arc::clone(&delivery), Arc::clone(&heartbeat)));

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into());

        Arc::new(Self {
            registry,
            presence,
            store,
            auth,
            heartbeat,
            delivery,
            offline_flush,
            router,
            hostname,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Start the background presence sweep (§4.5). Returns the join handle
    /// so callers can hold / abort it; the gateway itself never awaits it.
    pub fn spawn_presence_sweep(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        Arc::clone(&self.heartbeat).spawn_sweep(period)
    }
}
