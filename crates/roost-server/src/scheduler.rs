//! Background tasks: periodic automatic backups and snapshot retention.
//!
//! Failures are logged and swallowed; a broken backup run must never take
//! down the server or surface in a request path. Each task awaits its own
//! run before the next tick, so runs cannot overlap themselves.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use roost_core::{
  backup::{BackupKind, RETENTION_DAYS, SnapshotMeta},
  store::DeliveryStore,
};

/// Delay before the first automatic backup after startup.
const BACKUP_INITIAL_DELAY: Duration = Duration::from_secs(60);
/// Interval between automatic backups.
const BACKUP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);

/// Delay before the first retention sweep after startup.
const SWEEP_INITIAL_DELAY: Duration = Duration::from_secs(2 * 60);
/// Interval between retention sweeps.
const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Run one automatic backup.
pub async fn automatic_backup<S>(store: &S) -> Result<SnapshotMeta, S::Error>
where
  S: DeliveryStore,
{
  store.create_backup(BackupKind::Automatic).await
}

/// Remove snapshots older than the retention window. Returns the number
/// removed.
pub async fn retention_sweep<S>(store: &S) -> Result<u64, S::Error>
where
  S: DeliveryStore,
{
  let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
  store.prune_backups(cutoff).await
}

/// Spawn both background tasks for `store`.
pub fn spawn_tasks<S>(store: Arc<S>)
where
  S: DeliveryStore + 'static,
{
  let backup_store = store.clone();
  tokio::spawn(async move {
    tokio::time::sleep(BACKUP_INITIAL_DELAY).await;
    // The first tick completes immediately, so the first backup runs
    // right after the initial delay.
    let mut ticker = tokio::time::interval(BACKUP_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match automatic_backup(backup_store.as_ref()).await {
        Ok(meta) => {
          tracing::info!(filename = %meta.filename, "automatic backup created")
        }
        Err(e) => tracing::warn!("automatic backup failed: {e}"),
      }
    }
  });

  tokio::spawn(async move {
    tokio::time::sleep(SWEEP_INITIAL_DELAY).await;
    let mut ticker = tokio::time::interval(SWEEP_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match retention_sweep(store.as_ref()).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("retention sweep removed {n} snapshots"),
        Err(e) => tracing::warn!("retention sweep failed: {e}"),
      }
    }
  });
}
