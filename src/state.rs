use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::billing::gateway::{PaymentGateway, SimulatedGateway};
use crate::billing::ledger::{LedgerStore, PgLedgerStore};
use crate::config::AppConfig;
use crate::users::store::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        let ledger = Arc::new(PgLedgerStore::new(db.clone())) as Arc<dyn LedgerStore>;
        let payments = Arc::new(SimulatedGateway) as Arc<dyn PaymentGateway>;

        Ok(Self {
            db,
            config,
            users,
            ledger,
            payments,
        })
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            config,
            users,
            ledger,
            payments,
        }
    }
}
