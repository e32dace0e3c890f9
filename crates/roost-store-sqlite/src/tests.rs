//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use roost_core::{
  backup::{BackupKind, SnapshotPayload},
  delivery::{NewDelivery, PriceOutcome},
  order::{NewOrder, OrderPatch, OrderStatus},
  store::DeliveryStore,
  transaction::{
    NewDeliveryEntry, NewPayment, TransactionKind, TransactionPatch,
  },
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn dec(s: &str) -> Decimal {
  s.parse().unwrap()
}

fn new_delivery(name: &str, phone: Option<&str>) -> NewDelivery {
  NewDelivery {
    customer_name:       name.into(),
    customer_phone:      phone.map(Into::into),
    chick_type:          "Boiler".into(),
    loaded_box_weight:   dec("52.5"),
    empty_box_weight:    dec("2.5"),
    number_of_boxes:     Some(2),
    notes:               String::new(),
    loaded_weights_list: vec![dec("26.25"), dec("26.25")],
    empty_weights_list:  vec![dec("1.25"), dec("1.25")],
    order_id:            None,
  }
}

fn new_order(name: &str, phone: &str) -> NewOrder {
  NewOrder {
    chick_type:     "Layer".into(),
    quantity:       100,
    customer_name:  name.into(),
    customer_phone: phone.into(),
    notes:          String::new(),
  }
}

fn delivery_entry(phone: &str, date: &str, kgs: &str, price: &str) -> NewDeliveryEntry {
  NewDeliveryEntry {
    customer_phone: phone.into(),
    customer_name:  "Asha".into(),
    date:           roost_core::transaction::parse_effective_date(date).unwrap(),
    kgs:            dec(kgs),
    price_per_kg:   dec(price),
    notes:          String::new(),
    delivery_id:    None,
  }
}

fn payment(phone: &str, date: &str, amount: &str) -> NewPayment {
  NewPayment {
    customer_phone: phone.into(),
    customer_name:  "Asha".into(),
    date:           roost_core::transaction::parse_effective_date(date).unwrap(),
    amount:         dec(amount),
    notes:          String::new(),
  }
}

// ─── Deliveries ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_list_deliveries() {
  let s = store().await;

  let created = s
    .create_delivery(new_delivery("Asha", Some("9999999999")))
    .await
    .unwrap();
  assert_eq!(created.net_weight, Decimal::from(50));
  assert!(created.price_per_kg.is_none());
  assert!(created.id > 0);

  let all = s.list_deliveries().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].id, created.id);
  assert_eq!(all[0].loaded_weights_list, vec![dec("26.25"), dec("26.25")]);
}

#[tokio::test]
async fn update_delivery_recomputes_net_weight() {
  let s = store().await;
  let created = s.create_delivery(new_delivery("Asha", None)).await.unwrap();

  let mut input = new_delivery("Asha", None);
  input.loaded_box_weight = dec("30");
  input.empty_box_weight = dec("5");
  let updated = s.update_delivery(created.id, input).await.unwrap().unwrap();
  assert_eq!(updated.net_weight, Decimal::from(25));
  assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn update_delivery_missing_returns_none() {
  let s = store().await;
  let result = s.update_delivery(404, new_delivery("X", None)).await.unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn delete_delivery_and_delete_all() {
  let s = store().await;
  let a = s.create_delivery(new_delivery("A", None)).await.unwrap();
  s.create_delivery(new_delivery("B", None)).await.unwrap();

  assert!(s.delete_delivery(a.id).await.unwrap());
  assert!(!s.delete_delivery(a.id).await.unwrap());
  assert_eq!(s.delete_all_deliveries().await.unwrap(), 1);
  assert!(s.list_deliveries().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_deliveries_on_matches_calendar_date() {
  let s = store().await;
  s.create_delivery(new_delivery("A", None)).await.unwrap();

  let today = Utc::now().date_naive();
  let other = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();

  assert_eq!(s.delete_deliveries_on(other).await.unwrap(), 0);
  assert_eq!(s.delete_deliveries_on(today).await.unwrap(), 1);
}

// ─── Pricing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn price_delivery_posts_linked_ledger_entry() {
  let s = store().await;
  let created = s
    .create_delivery(new_delivery("Asha", Some("9999999999")))
    .await
    .unwrap();

  let outcome = s.price_delivery(created.id, dec("50")).await.unwrap();
  let PriceOutcome::Priced(priced) = outcome else {
    panic!("expected priced outcome");
  };
  assert_eq!(priced.price_per_kg, Some(dec("50")));
  assert_eq!(priced.total_amount, Some(dec("2500")));

  let txns = s.transactions("9999999999").await.unwrap();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].kind, TransactionKind::Delivery);
  assert_eq!(txns[0].amount, dec("2500"));
  assert_eq!(txns[0].delivery_id, Some(created.id));
  assert_eq!(priced.account_transaction_id, Some(txns[0].id));

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.outstanding_amount, dec("2500"));
}

#[tokio::test]
async fn repricing_replaces_the_ledger_entry() {
  let s = store().await;
  let created = s
    .create_delivery(new_delivery("Asha", Some("9999999999")))
    .await
    .unwrap();

  s.price_delivery(created.id, dec("50")).await.unwrap();
  let outcome = s.price_delivery(created.id, dec("60")).await.unwrap();
  let PriceOutcome::Priced(priced) = outcome else {
    panic!("expected priced outcome");
  };
  assert_eq!(priced.total_amount, Some(dec("3000")));

  // Still exactly one ledger entry for this delivery.
  let txns = s.transactions("9999999999").await.unwrap();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].amount, dec("3000"));

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, dec("3000"));
}

#[tokio::test]
async fn repricing_after_phone_change_heals_the_old_account() {
  let s = store().await;
  let created = s
    .create_delivery(new_delivery("Asha", Some("1111111111")))
    .await
    .unwrap();
  s.price_delivery(created.id, dec("50")).await.unwrap();

  s.update_delivery(created.id, new_delivery("Asha", Some("2222222222")))
    .await
    .unwrap()
    .unwrap();
  s.price_delivery(created.id, dec("50")).await.unwrap();

  // The replaced entry belonged to the old account; with it gone, that
  // account's totals go back to zero.
  let old = s.get_account("1111111111").await.unwrap().unwrap();
  assert_eq!(old.total_amount, Decimal::ZERO);
  assert!(s.transactions("1111111111").await.unwrap().is_empty());

  let moved = s.get_account("2222222222").await.unwrap().unwrap();
  assert_eq!(moved.total_amount, dec("2500"));
}

#[tokio::test]
async fn price_delivery_outcomes_for_bad_input() {
  let s = store().await;
  assert!(matches!(
    s.price_delivery(404, dec("50")).await.unwrap(),
    PriceOutcome::NotFound
  ));

  let no_phone = s.create_delivery(new_delivery("Walk-in", None)).await.unwrap();
  assert!(matches!(
    s.price_delivery(no_phone.id, dec("50")).await.unwrap(),
    PriceOutcome::NoCustomerPhone
  ));
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_order_starts_pending() {
  let s = store().await;
  let order = s.create_order(new_order("Asha", "9999999999")).await.unwrap();
  assert_eq!(order.status, OrderStatus::Pending);

  let all = s.list_orders().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].id, order.id);
}

#[tokio::test]
async fn update_order_patches_status_and_keeps_notes() {
  let s = store().await;
  let mut input = new_order("Asha", "9999999999");
  input.notes = "call before delivery".into();
  let order = s.create_order(input).await.unwrap();

  let patch = OrderPatch {
    status: Some(OrderStatus::Confirmed),
    notes:  None,
  };
  let updated = s.update_order(order.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.status, OrderStatus::Confirmed);
  assert_eq!(updated.notes, "call before delivery");
  assert!(updated.updated_at >= order.updated_at);

  assert!(s.update_order(404, OrderPatch::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_orders() {
  let s = store().await;
  let order = s.create_order(new_order("A", "1")).await.unwrap();
  s.create_order(new_order("B", "2")).await.unwrap();

  assert!(s.delete_order(order.id).await.unwrap());
  assert_eq!(s.delete_all_orders().await.unwrap(), 1);
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_account_is_idempotent() {
  let s = store().await;

  let first = s.get_or_create_account("9999999999", "Asha").await.unwrap();
  assert_eq!(first.outstanding_amount, Decimal::ZERO);
  assert!(!first.hidden);

  s.add_payment(payment("9999999999", "2024-01-01", "200")).await.unwrap();

  // A second call must not reset totals.
  let again = s.get_or_create_account("9999999999", "Asha").await.unwrap();
  assert_eq!(again.id, first.id);
  assert_eq!(again.total_paid, dec("200"));
}

#[tokio::test]
async fn get_account_missing_returns_none() {
  let s = store().await;
  assert!(s.get_account("0000000000").await.unwrap().is_none());
}

#[tokio::test]
async fn toggle_visibility_round_trips() {
  let s = store().await;
  s.get_or_create_account("9999999999", "Asha").await.unwrap();

  let hidden = s.toggle_account_visibility("9999999999").await.unwrap().unwrap();
  assert!(hidden.hidden);
  let visible = s.toggle_account_visibility("9999999999").await.unwrap().unwrap();
  assert!(!visible.hidden);

  assert!(s.toggle_account_visibility("0000000000").await.unwrap().is_none());
}

#[tokio::test]
async fn hidden_accounts_are_filtered_from_listing() {
  let s = store().await;
  s.get_or_create_account("1111111111", "A").await.unwrap();
  s.get_or_create_account("2222222222", "B").await.unwrap();
  s.toggle_account_visibility("2222222222").await.unwrap();

  let visible = s.list_accounts(false).await.unwrap();
  assert_eq!(visible.len(), 1);
  assert_eq!(visible[0].customer_phone, "1111111111");

  let all = s.list_accounts(true).await.unwrap();
  assert_eq!(all.len(), 2);

  let hidden = s.hidden_accounts().await.unwrap();
  assert_eq!(hidden.len(), 1);
  assert_eq!(hidden[0].customer_phone, "2222222222");
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_entry_computes_amount_and_totals() {
  let s = store().await;

  let txn = s
    .add_delivery_entry(delivery_entry("9999999999", "2024-01-01", "10", "50"))
    .await
    .unwrap();
  assert_eq!(txn.amount, dec("500"));
  assert_eq!(txn.kind, TransactionKind::Delivery);

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, dec("500"));
  assert_eq!(account.total_paid, Decimal::ZERO);
  assert_eq!(account.outstanding_amount, dec("500"));
}

#[tokio::test]
async fn payment_reduces_outstanding() {
  let s = store().await;
  s.add_delivery_entry(delivery_entry("9999999999", "2024-01-01", "10", "50"))
    .await
    .unwrap();
  s.add_payment(payment("9999999999", "2024-01-02", "200")).await.unwrap();

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_paid, dec("200"));
  assert_eq!(account.outstanding_amount, dec("300"));
}

#[tokio::test]
async fn deleting_a_transaction_recomputes_totals() {
  let s = store().await;
  let txn = s
    .add_delivery_entry(delivery_entry("9999999999", "2024-01-01", "10", "50"))
    .await
    .unwrap();
  s.add_payment(payment("9999999999", "2024-01-02", "200")).await.unwrap();

  assert!(s.delete_transaction(txn.id).await.unwrap());
  assert!(!s.delete_transaction(txn.id).await.unwrap());

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, Decimal::ZERO);
  assert_eq!(account.outstanding_amount, dec("-200"));
}

#[tokio::test]
async fn deleting_a_pricing_entry_clears_the_delivery_link() {
  let s = store().await;
  let created = s
    .create_delivery(new_delivery("Asha", Some("9999999999")))
    .await
    .unwrap();
  let PriceOutcome::Priced(priced) =
    s.price_delivery(created.id, dec("50")).await.unwrap()
  else {
    panic!("expected priced outcome");
  };

  s.delete_transaction(priced.account_transaction_id.unwrap())
    .await
    .unwrap();

  let all = s.list_deliveries().await.unwrap();
  assert!(all[0].account_transaction_id.is_none());
}

#[tokio::test]
async fn update_transaction_rederives_amount_and_totals() {
  let s = store().await;
  let txn = s
    .add_delivery_entry(delivery_entry("9999999999", "2024-01-01", "10", "50"))
    .await
    .unwrap();

  let patch = TransactionPatch {
    kgs: Some(dec("12")),
    ..Default::default()
  };
  let updated = s.update_transaction(txn.id, patch).await.unwrap().unwrap();
  assert_eq!(updated.amount, dec("600"));

  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, dec("600"));

  assert!(s
    .update_transaction(404, TransactionPatch::default())
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn transactions_sort_by_effective_date_descending() {
  let s = store().await;
  // Inserted out of order; the back-dated entry must sort by its
  // effective date, not creation time.
  s.add_payment(payment("9999999999", "2024-01-05", "1")).await.unwrap();
  s.add_payment(payment("9999999999", "2024-01-01", "2")).await.unwrap();
  s.add_payment(payment("9999999999", "2024-01-03", "3")).await.unwrap();

  let txns = s.transactions("9999999999").await.unwrap();
  let dates: Vec<_> = txns.iter().map(|t| t.date).collect();
  assert_eq!(
    dates,
    vec![
      Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
      Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
      Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ]
  );
}

#[tokio::test]
async fn many_small_amounts_sum_exactly() {
  let s = store().await;
  for _ in 0..100 {
    s.add_payment(payment("9999999999", "2024-01-01", "0.10")).await.unwrap();
  }
  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_paid, dec("10"));
}

// ─── Backups ─────────────────────────────────────────────────────────────────

async fn seeded_store() -> SqliteStore {
  let s = store().await;
  s.create_delivery(new_delivery("Asha", Some("9999999999"))).await.unwrap();
  s.create_order(new_order("Asha", "9999999999")).await.unwrap();
  s.add_delivery_entry(delivery_entry("9999999999", "2024-01-01", "10", "50"))
    .await
    .unwrap();
  s
}

#[tokio::test]
async fn create_and_list_backups() {
  let s = seeded_store().await;

  let meta = s.create_backup(BackupKind::Manual).await.unwrap();
  assert_eq!(meta.counts.deliveries, 1);
  assert_eq!(meta.counts.orders, 1);
  assert!(meta.size > 0);
  assert!(meta.filename.starts_with("backup-"));
  assert!(meta.filename.ends_with(".json"));

  let listed = s.list_backups().await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].filename, meta.filename);
  assert_eq!(listed[0].kind, BackupKind::Manual);
}

#[tokio::test]
async fn restore_round_trips_with_original_ids() {
  let s = seeded_store().await;
  let before_deliveries = s.list_deliveries().await.unwrap();
  let before_account = s.get_account("9999999999").await.unwrap().unwrap();

  let meta = s.create_backup(BackupKind::Manual).await.unwrap();

  // Mutate everything, then restore.
  s.delete_all_deliveries().await.unwrap();
  s.delete_all_orders().await.unwrap();
  s.add_payment(payment("9999999999", "2024-02-01", "400")).await.unwrap();

  let report = s.restore_backup(&meta.filename).await.unwrap().unwrap();
  assert_eq!(report.deliveries_restored, 1);
  assert_eq!(report.orders_restored, 1);

  let after_deliveries = s.list_deliveries().await.unwrap();
  assert_eq!(after_deliveries.len(), 1);
  assert_eq!(after_deliveries[0].id, before_deliveries[0].id);

  // Ledger state rolled back with the snapshot.
  let after_account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(after_account.total_paid, before_account.total_paid);
  assert_eq!(after_account.outstanding_amount, before_account.outstanding_amount);
}

#[tokio::test]
async fn restore_unknown_filename_returns_none() {
  let s = store().await;
  assert!(s.restore_backup("backup-nope.json").await.unwrap().is_none());
}

#[tokio::test]
async fn legacy_snapshot_restores_without_touching_the_ledger() {
  let s = seeded_store().await;

  let payload: SnapshotPayload = serde_json::from_str(
    r#"{"version":"1.0","timestamp":"2024-01-01T00:00:00Z",
        "deliveries":[],"orders":[],
        "counts":{"deliveries":0,"orders":0}}"#,
  )
  .unwrap();

  let report = s.restore_from_data(payload).await.unwrap();
  assert_eq!(report.deliveries_restored, 0);

  assert!(s.list_deliveries().await.unwrap().is_empty());
  // Ledger data predating the snapshot format survives.
  let account = s.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, dec("500"));
}

#[tokio::test]
async fn merge_is_additive_and_reassigns_ids() {
  // Build a snapshot with 3 deliveries and 2 orders.
  let source = store().await;
  for name in ["A", "B", "C"] {
    source.create_delivery(new_delivery(name, Some("1111111111"))).await.unwrap();
  }
  source.create_order(new_order("A", "1111111111")).await.unwrap();
  source.create_order(new_order("B", "1111111111")).await.unwrap();
  let meta = source.create_backup(BackupKind::Manual).await.unwrap();
  let payload = source.get_backup(&meta.filename).await.unwrap().unwrap();

  // Merge into a store that already has 1 delivery and 1 order.
  let target = store().await;
  let existing = target
    .create_delivery(new_delivery("Existing", Some("2222222222")))
    .await
    .unwrap();
  target.create_order(new_order("Existing", "2222222222")).await.unwrap();

  let report = target.merge_from_data(payload).await.unwrap();
  assert_eq!(report.deliveries_added, 3);
  assert_eq!(report.orders_added, 2);

  let deliveries = target.list_deliveries().await.unwrap();
  assert_eq!(deliveries.len(), 4);
  assert_eq!(target.list_orders().await.unwrap().len(), 3);

  // No id collisions with the pre-existing record.
  let mut ids: Vec<_> = deliveries.iter().map(|d| d.id).collect();
  ids.sort_unstable();
  ids.dedup();
  assert_eq!(ids.len(), 4);
  assert!(ids.contains(&existing.id));
}

#[tokio::test]
async fn merge_remaps_ledger_links_to_new_ids() {
  let source = store().await;
  let delivery = source
    .create_delivery(new_delivery("Asha", Some("9999999999")))
    .await
    .unwrap();
  source.price_delivery(delivery.id, dec("50")).await.unwrap();
  let meta = source.create_backup(BackupKind::Manual).await.unwrap();
  let payload = source.get_backup(&meta.filename).await.unwrap().unwrap();

  let target = store().await;
  // Occupy the source ids so the merge must reassign.
  target.create_delivery(new_delivery("Other", None)).await.unwrap();
  target.merge_from_data(payload).await.unwrap();

  let merged = target
    .list_deliveries()
    .await
    .unwrap()
    .into_iter()
    .find(|d| d.customer_name == "Asha")
    .unwrap();
  assert_ne!(merged.id, delivery.id);

  let txns = target.transactions("9999999999").await.unwrap();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].delivery_id, Some(merged.id));
  assert_eq!(merged.account_transaction_id, Some(txns[0].id));

  let account = target.get_account("9999999999").await.unwrap().unwrap();
  assert_eq!(account.total_amount, dec("2500"));
}

#[tokio::test]
async fn merge_drops_pricing_links_it_cannot_remap() {
  let target = store().await;
  // An unrelated entry occupies the transaction id the snapshot names.
  let unrelated = target
    .add_payment(payment("2222222222", "2024-01-01", "100"))
    .await
    .unwrap();

  // A pre-ledger snapshot: the delivery claims a pricing link, but the
  // payload carries no transactions to remap it against.
  let payload: SnapshotPayload = serde_json::from_str(&format!(
    r#"{{"version":"1.0","timestamp":"2024-01-01T00:00:00Z",
        "deliveries":[{{"id":7,"customerName":"Asha",
          "customerPhone":"9999999999","chickType":"Boiler",
          "loadedBoxWeight":"52.5","emptyBoxWeight":"2.5","netWeight":"50",
          "pricePerKg":"50","totalAmount":"2500",
          "accountTransactionId":{},
          "createdAt":"2024-01-01T00:00:00Z"}}]}}"#,
    unrelated.id,
  ))
  .unwrap();

  target.merge_from_data(payload).await.unwrap();

  let merged = target
    .list_deliveries()
    .await
    .unwrap()
    .into_iter()
    .find(|d| d.customer_name == "Asha")
    .unwrap();
  assert!(merged.account_transaction_id.is_none());

  // Deleting the unrelated entry must not clear the merged delivery.
  assert!(target.delete_transaction(unrelated.id).await.unwrap());
  let still = target
    .list_deliveries()
    .await
    .unwrap()
    .into_iter()
    .find(|d| d.customer_name == "Asha")
    .unwrap();
  assert!(still.account_transaction_id.is_none());
}

#[tokio::test]
async fn delete_backup_reports_removal() {
  let s = seeded_store().await;
  let meta = s.create_backup(BackupKind::Manual).await.unwrap();

  assert!(s.delete_backup(&meta.filename).await.unwrap());
  assert!(!s.delete_backup(&meta.filename).await.unwrap());
}

#[tokio::test]
async fn automatic_backup_prunes_expired_snapshots() {
  let s = seeded_store().await;
  let old = s.create_backup(BackupKind::Manual).await.unwrap();
  s.backdate_backup(&old.filename, Utc::now() - Duration::days(20))
    .await
    .unwrap();

  // Manual backups never prune.
  s.create_backup(BackupKind::Manual).await.unwrap();
  assert_eq!(s.list_backups().await.unwrap().len(), 2);

  // An automatic backup sweeps anything past retention as it runs.
  s.create_backup(BackupKind::Automatic).await.unwrap();
  let listed = s.list_backups().await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(listed.iter().all(|m| m.filename != old.filename));
}

#[tokio::test]
async fn prune_backups_removes_old_snapshots() {
  let s = seeded_store().await;
  s.create_backup(BackupKind::Manual).await.unwrap();

  // Nothing is older than two weeks ago.
  let removed =
    s.prune_backups(Utc::now() - Duration::days(14)).await.unwrap();
  assert_eq!(removed, 0);

  // Everything is older than a future cutoff.
  let removed =
    s.prune_backups(Utc::now() + Duration::days(1)).await.unwrap();
  assert_eq!(removed, 1);
  assert!(s.list_backups().await.unwrap().is_empty());
}
