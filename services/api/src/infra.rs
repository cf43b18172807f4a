use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use campus_market::config::AppConfig;
use campus_market::error::AppError;
use campus_market::listings::{
    AssetStore, CleanupError, CleanupSweep, MailGateway, NullAssetStore, PostgresListingStore,
    S3AssetStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the production cleanup engine: Postgres-backed store, S3 asset
/// deletion when object storage is configured, and the mail gateway with its
/// spool fallback.
pub(crate) fn build_sweep(config: &AppConfig) -> Result<Arc<CleanupSweep>, AppError> {
    let store = PostgresListingStore::connect_lazy(&config.database)
        .map_err(|err| AppError::Cleanup(CleanupError::Store(err)))?;

    let assets: Arc<dyn AssetStore> = match &config.storage.bucket {
        Some(bucket) => Arc::new(S3AssetStore::new(bucket)),
        None => Arc::new(NullAssetStore),
    };

    let notifier = Arc::new(MailGateway::new(config.mail.clone()));

    Ok(Arc::new(CleanupSweep::new(
        Arc::new(store),
        notifier,
        assets,
        config.storage.public_base_url.clone(),
    )))
}
