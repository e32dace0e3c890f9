//! Backup snapshots — point-in-time, self-contained copies of the
//! delivery, order, and ledger datasets.
//!
//! A snapshot moves through `created → (downloaded | restored | deleted)`
//! and never back. Restore is a destructive replace-all; merge is additive
//! and reassigns ids to avoid collisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{account::Account, delivery::Delivery, order::Order, transaction::Transaction};

/// Current snapshot payload version. Version 1 predates ledger inclusion;
/// its payloads lack the `accounts`/`transactions` arrays and are still
/// accepted on restore and merge.
pub const SNAPSHOT_VERSION: &str = "2";

/// Automatic snapshots older than this are pruned on every automatic
/// backup and by the daily retention sweep.
pub const RETENTION_DAYS: i64 = 15;

/// Upper bound on the number of snapshots returned by a metadata listing.
pub const LIST_CAP: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
  Manual,
  Automatic,
}

/// Denormalised record counts carried inside a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
  pub deliveries: usize,
  pub orders:     usize,
}

fn legacy_version() -> String {
  "1.0".to_string()
}

/// The full persisted snapshot body.
///
/// Everything except `deliveries` is defaulted on deserialisation so
/// hand-supplied upload bodies are accepted; a missing `version` is
/// treated as the pre-ledger format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
  #[serde(default = "legacy_version")]
  pub version:      String,
  #[serde(default = "Utc::now")]
  pub timestamp:    DateTime<Utc>,
  pub deliveries:   Vec<Delivery>,
  #[serde(default)]
  pub orders:       Vec<Order>,
  #[serde(default)]
  pub accounts:     Vec<Account>,
  #[serde(default)]
  pub transactions: Vec<Transaction>,
  #[serde(default)]
  pub counts:       SnapshotCounts,
}

impl SnapshotPayload {
  pub fn new(
    deliveries: Vec<Delivery>,
    orders: Vec<Order>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
  ) -> Self {
    let counts = SnapshotCounts {
      deliveries: deliveries.len(),
      orders:     orders.len(),
    };
    Self {
      version: SNAPSHOT_VERSION.to_string(),
      timestamp: Utc::now(),
      deliveries,
      orders,
      accounts,
      transactions,
      counts,
    }
  }
}

/// Snapshot metadata as returned by listings; the payload itself is
/// fetched separately by filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
  pub filename:   String,
  #[serde(rename = "type")]
  pub kind:       BackupKind,
  pub counts:     SnapshotCounts,
  /// Byte length of the serialised payload.
  pub size:       u64,
  pub created_at: DateTime<Utc>,
}

/// Outcome of a replace-all restore.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
  pub deliveries_restored: usize,
  pub orders_restored:     usize,
}

/// Outcome of an additive merge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
  pub deliveries_added: usize,
  pub orders_added:     usize,
}
