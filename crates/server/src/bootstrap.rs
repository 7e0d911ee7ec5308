use std::sync::Arc;

use slotbook_bot::{default_dispatcher, PollingRunner, ReconnectPolicy, TelegramTransport, TransportError, TransportMessageSink};
use slotbook_core::config::{AppConfig, ConfigError, LoadOptions};
use slotbook_core::store::load_catalog;
use slotbook_core::{DialogueDeps, DialogueEngine, StoreError, SystemClock};
use slotbook_db::{connect_with_settings, migrations, DbPool, SqlBookingStore, SqlCatalogStore};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<DialogueEngine>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog could not be loaded: {0}")]
    Catalog(#[source] StoreError),
    #[error("bot transport could not be built: {0}")]
    Transport(#[source] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let catalog_store = Arc::new(SqlCatalogStore::new(db_pool.clone()));
    let catalog = load_catalog(catalog_store.as_ref()).await.map_err(BootstrapError::Catalog)?;
    if catalog.menu_packages().is_empty() {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            "no packages in the catalog; run `slotbook seed` to load the defaults"
        );
    }
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        packages = catalog.menu_packages().len(),
        active_masters = catalog.active_masters().len(),
        "catalog loaded"
    );

    let transport = Arc::new(TelegramTransport::from_config(&config.bot).map_err(BootstrapError::Transport)?);
    let engine = Arc::new(DialogueEngine::new(
        config.booking.dialogue_settings(),
        catalog,
        DialogueDeps {
            bookings: Arc::new(SqlBookingStore::new(db_pool.clone())),
            catalog_store,
            sink: Arc::new(TransportMessageSink::new(transport.clone())),
            clock: Arc::new(SystemClock),
        },
    ));
    let runner = PollingRunner::new(transport, default_dispatcher(engine.clone()), ReconnectPolicy::default());

    Ok(Application { config, db_pool, engine, runner })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use slotbook_core::config::{ConfigOverrides, LoadOptions};
    use slotbook_core::PackageKey;
    use slotbook_db::seed_catalog;

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str, bot_token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                bot_token: Some(bot_token.to_string()),
                admins: Some(vec![100, 200]),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = bootstrap(options("sqlite::memory:", "not-a-token")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("bot.token"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_loads_the_seeded_catalog() {
        let database_url = "sqlite::memory:?cache=shared";
        let first = bootstrap(options(database_url, "123456:ABCdefGHIjkl"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('masters', 'packages', 'slots')",
        )
        .fetch_one(&first.db_pool)
        .await
        .expect("booking tables should exist after bootstrap");
        assert_eq!(table_count, 3);

        seed_catalog(&first.db_pool).await.expect("seed");

        let second = bootstrap(options(database_url, "123456:ABCdefGHIjkl"))
            .await
            .expect("second bootstrap sees the seeded catalog");
        let catalog = second.engine.catalog();
        let complex = catalog.package(&PackageKey("complex".to_owned())).expect("complex package");
        assert_eq!(complex.price, Decimal::new(5000, 0));
        assert_eq!(second.config.booking.admin_set().len(), 2);

        second.db_pool.close().await;
        first.db_pool.close().await;
    }
}
