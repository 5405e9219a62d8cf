//! The `api` and `stream` commands.

use crate::config::Config;
use crate::observability::all_metric_defs;
use aggregator::{ApiError, Services};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use store::Stores;
use store::memory::{InMemoryStore, SnapshotError};
use stream_router::{BatchSummary, ChangeEventBatch, ChangeEventRouter, default_registrations};
use upstreams::{UpstreamError, Upstreams};

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("missing `{0}` section in config")]
    MissingSection(&'static str),
    #[error("store snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("admin listener failed: {0}")]
    Admin(std::io::Error),
    #[error("could not read change events: {0}")]
    Input(std::io::Error),
    #[error("malformed change event batch: {0}")]
    Decode(#[from] serde_json::Error),
}

struct OpenStore {
    kv: Arc<InMemoryStore>,
    stores: Stores,
}

impl OpenStore {
    /// Creates the stage's tables and seeds them from the snapshot when one exists.
    fn open(config: &Config) -> Result<Self, CommandError> {
        let tables = config.table_names();
        let (kv, stores) = Stores::in_memory(&tables, config.store.page_size);
        if let Some(path) = &config.store.snapshot_path {
            if path.exists() {
                let loaded = kv.load_snapshot(path)?;
                tracing::info!(path = %path.display(), loaded, "store snapshot loaded");
            } else {
                tracing::info!(path = %path.display(), "no store snapshot yet, starting empty");
            }
        }
        Ok(OpenStore { kv, stores })
    }

    fn save(&self, config: &Config) -> Result<(), CommandError> {
        if let Some(path) = &config.store.snapshot_path {
            self.kv.store_snapshot(path)?;
            tracing::info!(path = %path.display(), "store snapshot written");
        }
        Ok(())
    }
}

/// Serves the REST API and the admin listener until either fails or the
/// process is interrupted.
pub async fn run_api(config: &Config) -> Result<(), CommandError> {
    let api = config.api.as_ref().ok_or(CommandError::MissingSection("api"))?;
    let upstreams = config
        .upstreams
        .as_ref()
        .ok_or(CommandError::MissingSection("upstreams"))?;

    let store = OpenStore::open(config)?;
    let upstreams = Upstreams::from_config(upstreams)?;
    let services = Services::from_config(api, &store.stores, &upstreams);
    let admin = AdminService::new(|| true).with_metric_defs(all_metric_defs());

    let result = tokio::select! {
        served = aggregator::serve(&api.listener, services) => served.map_err(CommandError::from),
        admin = run_http_service(&api.admin_listener.host, api.admin_listener.port, admin) => {
            admin.map_err(CommandError::Admin)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    };

    store.save(config)?;
    result
}

/// Routes one batch of change events read from `input`, or stdin.
pub async fn run_stream(
    config: &Config,
    input: Option<&Path>,
) -> Result<BatchSummary, CommandError> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path).map_err(CommandError::Input)?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(CommandError::Input)?;
            raw
        }
    };
    let batch: ChangeEventBatch = serde_json::from_str(&raw)?;

    let store = OpenStore::open(config)?;
    let router = ChangeEventRouter::new(default_registrations(
        &config.table_names(),
        store.stores.counters.clone(),
    ));
    let summary = router.process_batch(&batch).await;
    tracing::info!(
        received = summary.received,
        handled = summary.handled,
        unrouted = summary.unrouted,
        failed = summary.failed,
        "change event batch processed"
    );

    store.save(config)?;
    Ok(summary)
}
