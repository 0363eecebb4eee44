//! Application state for order-hub

use std::sync::Arc;

use crate::config::Config;
use crate::db::catalog::MemoryCatalog;
use crate::db::memory::MemoryStore;
use crate::db::postgres::PgStore;
use crate::db::{Catalog, OrderStore};
use crate::lifecycle::LifecycleEngine;
use crate::live::NotificationRouter;
use crate::orders::{
    BillLocks, OrderIngestService, OrderQueryService, PaymentService, StatusUpdateService,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    /// Live topic fan-out (one instance per process)
    pub router: NotificationRouter,
    pub engine: LifecycleEngine,
    pub ingest: OrderIngestService,
    pub status: StatusUpdateService,
    pub payment: PaymentService,
    pub query: OrderQueryService,
    /// JWT secret for staff authentication
    pub jwt_secret: String,
}

impl AppState {
    /// Build state from configuration: PostgreSQL when `DATABASE_URL` is set, memory otherwise
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let (store, catalog): (Arc<dyn OrderStore>, Arc<dyn Catalog>) =
            match &config.database_url {
                Some(url) => {
                    let pg = Arc::new(PgStore::connect(url).await?);
                    let store: Arc<dyn OrderStore> = pg.clone();
                    let catalog: Arc<dyn Catalog> = pg;
                    (store, catalog)
                }
                None => {
                    let catalog = match &config.catalog_seed_path {
                        Some(path) => MemoryCatalog::load(path)?,
                        None => {
                            tracing::warn!("No CATALOG_SEED_PATH set, in-memory catalog is empty");
                            MemoryCatalog::new()
                        }
                    };
                    tracing::info!("Using in-memory order store");
                    let store: Arc<dyn OrderStore> = Arc::new(MemoryStore::new());
                    let catalog: Arc<dyn Catalog> = Arc::new(catalog);
                    (store, catalog)
                }
            };

        Ok(Self::with_backends(store, catalog, config))
    }

    /// Wire services over the given backends
    pub fn with_backends(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        config: &Config,
    ) -> Self {
        let router = NotificationRouter::new(config.live_channel_capacity);
        let engine = LifecycleEngine::new(config.declined_items);
        let locks = BillLocks::new();

        Self {
            ingest: OrderIngestService::new(
                store.clone(),
                catalog,
                router.clone(),
                engine,
                locks.clone(),
            ),
            status: StatusUpdateService::new(store.clone(), router.clone(), engine, locks.clone()),
            payment: PaymentService::new(store.clone(), router.clone(), engine, locks),
            query: OrderQueryService::new(store.clone(), engine),
            store,
            router,
            engine,
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}
