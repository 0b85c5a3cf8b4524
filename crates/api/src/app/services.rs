//! Service wiring: stores, identity provider, notification hub, ledger.
//!
//! Two modes, selected by configuration:
//! - in-memory stores (dev/tests), the default
//! - Postgres stores, when `USE_PERSISTENT_STORES=true`

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use stockroom_auth::{IdentityError, IdentityProvider, LegacyTokenVerifier, ProviderTokenVerifier, VerifierChain};
use stockroom_infra::identity::{HttpIdentityProvider, InMemoryIdentityProvider};
use stockroom_infra::profiles::{InMemoryProfileStore, PostgresProfileStore, ProfileRoles, ProfileStore};
use stockroom_infra::store::postgres::migrate;
use stockroom_infra::store::{InMemoryInventoryStore, PostgresInventoryStore};
use stockroom_infra::{AppConfig, InventoryStore, NotificationHub, StockLedger, StoreError, seed};

const MAX_DB_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to connect to Postgres: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

pub struct AppServices {
    pub inventory: Arc<dyn InventoryStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub hub: Arc<NotificationHub>,
    pub ledger: StockLedger,
    pub low_stock_threshold: i64,
}

impl AppServices {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        profiles: Arc<dyn ProfileStore>,
        identity: Arc<dyn IdentityProvider>,
        low_stock_threshold: i64,
    ) -> Self {
        let hub = Arc::new(NotificationHub::default());
        let ledger = StockLedger::new(inventory.clone(), hub.clone());
        Self {
            inventory,
            profiles,
            identity,
            hub,
            ledger,
            low_stock_threshold,
        }
    }

    /// Everything in process, with the given identity provider.
    pub fn in_memory(identity: Arc<dyn IdentityProvider>, low_stock_threshold: i64) -> Self {
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryProfileStore::new()),
            identity,
            low_stock_threshold,
        )
    }

    /// Provider tokens first, then locally signed tokens.
    pub fn verifier_chain(&self, jwt_secret: &str) -> VerifierChain {
        let roles = Arc::new(ProfileRoles::new(self.profiles.clone()));
        VerifierChain::new()
            .with(Arc::new(ProviderTokenVerifier::new(self.identity.clone(), roles)))
            .with(Arc::new(LegacyTokenVerifier::new(jwt_secret.as_bytes())))
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let identity: Arc<dyn IdentityProvider> = match &config.identity {
        Some(idp) => {
            info!(url = %idp.url, "using hosted identity provider");
            Arc::new(HttpIdentityProvider::new(&idp.url, &idp.service_key)?)
        }
        None => Arc::new(InMemoryIdentityProvider::new()),
    };

    let services = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(url)
                .await?;
            migrate(&pool).await?;
            info!("using Postgres stores");
            AppServices::new(
                Arc::new(PostgresInventoryStore::new(pool.clone())),
                Arc::new(PostgresProfileStore::new(pool)),
                identity,
                config.low_stock_threshold,
            )
        }
        None => {
            info!("using in-memory stores");
            AppServices::in_memory(identity, config.low_stock_threshold)
        }
    };

    if config.seed_demo_data {
        seed::seed_demo_items(services.inventory.as_ref()).await?;
    }

    Ok(services)
}
