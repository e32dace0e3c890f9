//! The `DeliveryStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `roost-store-sqlite`). Higher layers (`roost-api`, `roost-server`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
  account::Account,
  backup::{BackupKind, MergeReport, RestoreReport, SnapshotMeta, SnapshotPayload},
  delivery::{Delivery, NewDelivery, PriceOutcome},
  order::{NewOrder, Order, OrderPatch},
  transaction::{NewDeliveryEntry, NewPayment, Transaction, TransactionPatch},
};

/// Abstraction over a Roost storage backend.
///
/// Every ledger mutation (adding, editing, or deleting a transaction, and
/// pricing a delivery) re-derives the affected account's totals from the
/// full transaction history of that phone, atomically with the mutation
/// itself. Implementations must serialise mutations per customer phone so
/// the recomputation always observes a consistent transaction set.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DeliveryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Deliveries ────────────────────────────────────────────────────────

  /// List all deliveries, most recent first.
  fn list_deliveries(
    &self,
  ) -> impl Future<Output = Result<Vec<Delivery>, Self::Error>> + Send + '_;

  /// Create and persist a new delivery. The net weight is computed from
  /// the loaded/empty box weights.
  fn create_delivery(
    &self,
    input: NewDelivery,
  ) -> impl Future<Output = Result<Delivery, Self::Error>> + Send + '_;

  /// Replace the mutable fields of a delivery. Returns `None` if the id
  /// is unknown.
  fn update_delivery(
    &self,
    id: i64,
    input: NewDelivery,
  ) -> impl Future<Output = Result<Option<Delivery>, Self::Error>> + Send + '_;

  /// Remove one delivery; returns whether a record was removed.
  fn delete_delivery(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every delivery; returns the number removed.
  fn delete_all_deliveries(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Remove all deliveries created on the given calendar date (UTC).
  fn delete_deliveries_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Attach (or change) the price of a delivery, posting exactly one
  /// linked `delivery`-kind ledger transaction for it. A previously
  /// posted transaction for the same delivery is deleted first, so
  /// re-pricing never leaves duplicate ledger entries.
  fn price_delivery(
    &self,
    id: i64,
    price_per_kg: Decimal,
  ) -> impl Future<Output = Result<PriceOutcome, Self::Error>> + Send + '_;

  // ── Orders ────────────────────────────────────────────────────────────

  /// List all orders, most recent first.
  fn list_orders(
    &self,
  ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send + '_;

  fn create_order(
    &self,
    input: NewOrder,
  ) -> impl Future<Output = Result<Order, Self::Error>> + Send + '_;

  /// Shallow-merge `patch` into an order, bumping `updated_at`.
  fn update_order(
    &self,
    id: i64,
    patch: OrderPatch,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  fn delete_order(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_all_orders(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Look up the account for `phone`, creating it with zeroed totals if
  /// absent. Idempotent: repeated calls return the same account without
  /// resetting its totals.
  fn get_or_create_account<'a>(
    &'a self,
    phone: &'a str,
    name: &'a str,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + 'a;

  /// Pure lookup, no side effects. Returns `None` if absent.
  fn get_account<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// All accounts; hidden ones are filtered out unless `include_hidden`.
  fn list_accounts(
    &self,
    include_hidden: bool,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// Hidden accounts only.
  fn hidden_accounts(
    &self,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// Flip the `hidden` flag, bumping `updated_at`. Returns `None` if the
  /// account does not exist.
  fn toggle_account_visibility<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  // ── Transaction log ───────────────────────────────────────────────────

  /// Record a `delivery`-kind ledger entry (amount = kgs * price_per_kg)
  /// and recompute the owning account's totals.
  fn add_delivery_entry(
    &self,
    input: NewDeliveryEntry,
  ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send + '_;

  /// Record a `payment`-kind ledger entry and recompute the owning
  /// account's totals.
  fn add_payment(
    &self,
    input: NewPayment,
  ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send + '_;

  /// All transactions for a phone, sorted by effective `date` descending
  /// (back-dated entries order by their effective date, not creation
  /// time).
  fn transactions<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Vec<Transaction>, Self::Error>> + Send + 'a;

  /// Shallow-merge `patch` into a transaction and recompute totals.
  /// Returns `None` if the id is unknown.
  fn update_transaction(
    &self,
    id: i64,
    patch: TransactionPatch,
  ) -> impl Future<Output = Result<Option<Transaction>, Self::Error>> + Send + '_;

  /// Remove a transaction and recompute the owning account's totals;
  /// returns whether a record was removed.
  fn delete_transaction(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Backups ───────────────────────────────────────────────────────────

  /// Serialise the full current dataset into a new stored snapshot.
  /// Automatic backups additionally prune snapshots older than
  /// [`RETENTION_DAYS`](crate::backup::RETENTION_DAYS) as a side effect.
  fn create_backup(
    &self,
    kind: BackupKind,
  ) -> impl Future<Output = Result<SnapshotMeta, Self::Error>> + Send + '_;

  /// Snapshot metadata, newest first, capped at
  /// [`LIST_CAP`](crate::backup::LIST_CAP).
  fn list_backups(
    &self,
  ) -> impl Future<Output = Result<Vec<SnapshotMeta>, Self::Error>> + Send + '_;

  /// Fetch a full snapshot payload by filename.
  fn get_backup<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<Option<SnapshotPayload>, Self::Error>> + Send + 'a;

  /// Replace-all restore from a stored snapshot. Returns `None` if the
  /// filename is unknown.
  fn restore_backup<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<Option<RestoreReport>, Self::Error>> + Send + 'a;

  /// Replace-all restore from a caller-supplied payload (e.g. an
  /// uploaded file). All-or-nothing: a failure partway leaves the prior
  /// dataset intact.
  fn restore_from_data(
    &self,
    payload: SnapshotPayload,
  ) -> impl Future<Output = Result<RestoreReport, Self::Error>> + Send + '_;

  /// Additive merge from a caller-supplied payload: every record is
  /// inserted as a new row with a freshly assigned id; nothing existing
  /// is deleted.
  fn merge_from_data(
    &self,
    payload: SnapshotPayload,
  ) -> impl Future<Output = Result<MergeReport, Self::Error>> + Send + '_;

  /// Remove one stored snapshot; returns whether a record was removed.
  fn delete_backup<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Remove all snapshots created before `older_than`; returns the
  /// number removed.
  fn prune_backups(
    &self,
    older_than: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
