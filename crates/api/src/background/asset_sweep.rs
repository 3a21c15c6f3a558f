//! Periodic reclamation of leaked temporary assets.
//!
//! Every request deletes its own uploads, but a crash or a failed delete
//! can leak objects. This task deletes anything older than the horizon,
//! as the second line of defense behind per-request cleanup. Runs on a
//! fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use pixshop_db::repositories::TempAssetRepo;
use pixshop_store::AssetStore;

/// Default age after which a temporary asset is eligible for deletion.
const DEFAULT_HORIZON_HOURS: i64 = 2;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600); // 10 minutes

/// Run the temporary-asset sweep loop.
///
/// Deletes assets older than `ASSET_SWEEP_HORIZON_HOURS` (defaults to 2).
/// Runs until `cancel` is triggered.
pub async fn run(pool: PgPool, store: Arc<dyn AssetStore>, cancel: CancellationToken) {
    let horizon_hours: i64 = std::env::var("ASSET_SWEEP_HORIZON_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_HORIZON_HOURS);

    tracing::info!(
        horizon_hours,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Temporary asset sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Temporary asset sweep stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_once(&pool, store.as_ref(), horizon_hours).await;
            }
        }
    }
}

/// One sweep pass: list stale rows, delete each object (which also
/// removes its metadata row).
async fn sweep_once(pool: &PgPool, store: &dyn AssetStore, horizon_hours: i64) {
    let cutoff = Utc::now() - chrono::Duration::hours(horizon_hours);

    let stale = match TempAssetRepo::find_older_than(pool, cutoff).await {
        Ok(stale) => stale,
        Err(e) => {
            tracing::error!(error = %e, "Asset sweep: listing stale assets failed");
            return;
        }
    };

    if stale.is_empty() {
        tracing::debug!("Asset sweep: nothing to reclaim");
        return;
    }

    let mut reclaimed = 0u32;
    for asset in &stale {
        match store.delete(&asset.object_key).await {
            Ok(()) => reclaimed += 1,
            Err(e) => {
                tracing::warn!(
                    key = %asset.object_key,
                    error = %e,
                    "Asset sweep: delete failed, will retry next pass",
                );
            }
        }
    }

    tracing::info!(
        candidates = stale.len(),
        reclaimed,
        "Asset sweep: reclaimed leaked temporary assets"
    );
}
