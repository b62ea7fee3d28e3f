use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{self, DbPool},
    mailer::{LogMailer, Mailer, SmtpMailer},
    store::{CartStore, MemoryStore, OrderStore, PgStore, ProductCatalog, UserStore},
};

/// Shared handles behind every request. The four store handles usually point
/// at one backend struct; keeping them separate lets tests swap a single
/// seam (for example a failing order store) without touching the rest.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn postgres(pool: DbPool, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            catalog: store.clone(),
            carts: store.clone(),
            orders: store,
            mailer,
            config: Arc::new(config),
        }
    }

    pub fn in_memory(mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            catalog: store.clone(),
            carts: store.clone(),
            orders: store,
            mailer,
            config: Arc::new(config),
        }
    }

    /// Pick the backend from configuration: `DATABASE_URL` selects Postgres
    /// (with migrations applied), its absence selects the in-memory store.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::info!("SMTP not configured, order emails go to the log");
                Arc::new(LogMailer)
            }
        };

        match config.database_url.clone() {
            Some(url) => {
                let pool = db::create_pool(&url).await?;
                db::run_migrations(&pool).await?;
                Ok(Self::postgres(pool, mailer, config))
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set, using the in-memory store; state is lost on restart"
                );
                Ok(Self::in_memory(mailer, config))
            }
        }
    }
}
