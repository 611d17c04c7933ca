//! Background processing: the message router and the outbox forwarder.

use std::sync::Arc;

use messaging::{ForwarderHealth, InMemoryBus, OutboxForwarder, Router, RouterHandle};
use projections::{
    InMemoryOpsBookingStore, OpsBookingProjection, OpsBookingStore, PostgresOpsBookingStore,
};
use saga::{ExternalServices, RoutingTable, VipBundleProcessManager, VipBundleService};
use sqlx::PgPool;
use store::{InMemoryStore, OutboxStore, PostgresStore, SagaStore, VipBundleRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;

/// The stores the process runs on, chosen at startup.
#[derive(Clone)]
pub struct Stores {
    pub sagas: Arc<dyn SagaStore>,
    pub outbox: Arc<dyn OutboxStore>,
    pub ops_bookings: Arc<dyn OpsBookingStore>,
}

impl Stores {
    /// In-memory stores; state is lost when the process exits.
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        Self {
            sagas: Arc::new(store.clone()),
            outbox: Arc::new(store),
            ops_bookings: Arc::new(InMemoryOpsBookingStore::new()),
        }
    }

    /// PostgreSQL stores sharing one pool. Runs the migrations first.
    pub async fn postgres(pool: PgPool) -> store::Result<Self> {
        let store = PostgresStore::new(pool.clone());
        store.run_migrations().await?;
        Ok(Self {
            sagas: Arc::new(store.clone()),
            outbox: Arc::new(store),
            ops_bookings: Arc::new(PostgresOpsBookingStore::new(pool)),
        })
    }

    /// Returns the VIP bundle service over the saga store.
    pub fn vip_bundles(&self) -> VipBundleService<Arc<dyn SagaStore>> {
        VipBundleService::new(VipBundleRepository::new(self.sagas.clone()))
    }
}

/// The running router and forwarder.
pub struct Runtime {
    router: RouterHandle,
    forwarder: JoinHandle<()>,
    forwarder_health: watch::Receiver<ForwarderHealth>,
    shutdown: watch::Sender<bool>,
}

impl Runtime {
    /// Subscribes every route, then starts forwarding the outbox.
    pub async fn start(
        config: &Config,
        stores: &Stores,
        services: &ExternalServices,
        bus: InMemoryBus,
    ) -> messaging::Result<Self> {
        let manager = Arc::new(VipBundleProcessManager::new(VipBundleRepository::new(
            stores.sagas.clone(),
        )));

        let mut router = Router::new(
            Arc::new(bus.clone()),
            Arc::new(bus.clone()),
            config.router_config(),
        );
        RoutingTable::new()
            .with_saga(manager, stores.outbox.clone(), services)
            .with_projection(Arc::new(OpsBookingProjection::new(
                stores.ops_bookings.clone(),
            )))
            .install(&mut router);
        let router = router.start().await?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (forwarder, forwarder_health) =
            OutboxForwarder::new(stores.outbox.clone(), bus, config.forwarder_config())
                .spawn_supervised(shutdown_rx);

        Ok(Self {
            router,
            forwarder,
            forwarder_health,
            shutdown,
        })
    }

    /// Returns a receiver for the forwarder health.
    pub fn forwarder_health(&self) -> watch::Receiver<ForwarderHealth> {
        self.forwarder_health.clone()
    }

    /// Stops the forwarder, then lets the router finish in-flight messages.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.forwarder.await {
            tracing::error!(error = %e, "Outbox forwarder task failed");
        }
        self.router.shutdown().await;
        info!("Background processing stopped");
    }
}
