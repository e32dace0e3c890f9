//! [`SqliteStore`] — the SQLite implementation of [`DeliveryStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use rust_decimal::Decimal;

use roost_core::{
  account::{Account, AccountTotals},
  backup::{
    BackupKind, MergeReport, RestoreReport, SnapshotMeta, SnapshotPayload,
    LIST_CAP, RETENTION_DAYS, SNAPSHOT_VERSION,
  },
  delivery::{Delivery, NewDelivery, PriceOutcome},
  order::{NewOrder, Order, OrderPatch, OrderStatus},
  store::DeliveryStore,
  transaction::{
    NewDeliveryEntry, NewPayment, Transaction, TransactionKind,
    TransactionPatch,
  },
};

use crate::{
  encode::{
    encode_backup_kind, encode_decimal, encode_dt, encode_order_status,
    encode_txn_kind, encode_weights, sql_decimal, sql_dt, sql_txn_kind,
    RawAccount, RawBackupMeta, RawDelivery, RawOrder, RawTransaction,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roost delivery store backed by a single SQLite file.
///
/// All database work funnels through one connection on a dedicated thread,
/// so every multi-statement mutation below (wrapped in a SQLite
/// transaction inside one `call` closure) is serialised against every
/// other mutation. That is what makes the read-recompute-write cycle on
/// account totals safe without any extra locking.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── In-transaction helpers ──────────────────────────────────────────────────
//
// These run inside `call` closures (often mid-transaction), so they can
// only surface `rusqlite::Error`.

/// Create the account row for `phone` if it does not exist, then re-derive
/// its totals from the full transaction log.
fn recompute_totals(
  conn: &rusqlite::Connection,
  phone: &str,
  name: &str,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO accounts (customer_phone, customer_name, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?3)
     ON CONFLICT(customer_phone) DO NOTHING",
    rusqlite::params![phone, name, now],
  )?;

  let mut totals = AccountTotals::default();
  {
    let mut stmt = conn
      .prepare("SELECT kind, amount FROM transactions WHERE customer_phone = ?1")?;
    let rows = stmt.query_map(rusqlite::params![phone], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
      let (kind, amount) = row?;
      totals.record(sql_txn_kind(&kind)?, sql_decimal(&amount)?);
    }
  }

  conn.execute(
    "UPDATE accounts
     SET total_amount = ?2, total_paid = ?3, outstanding = ?4, updated_at = ?5
     WHERE customer_phone = ?1",
    rusqlite::params![
      phone,
      totals.total_amount.to_string(),
      totals.total_paid.to_string(),
      totals.outstanding().to_string(),
      now,
    ],
  )?;
  Ok(())
}

fn select_delivery(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawDelivery>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM deliveries WHERE id = ?1",
        RawDelivery::COLUMNS
      ),
      rusqlite::params![id],
      RawDelivery::from_row,
    )
    .optional()
}

fn select_order(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawOrder>> {
  conn
    .query_row(
      &format!("SELECT {} FROM orders WHERE id = ?1", RawOrder::COLUMNS),
      rusqlite::params![id],
      RawOrder::from_row,
    )
    .optional()
}

fn select_account(
  conn: &rusqlite::Connection,
  phone: &str,
) -> rusqlite::Result<Option<RawAccount>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM accounts WHERE customer_phone = ?1",
        RawAccount::COLUMNS
      ),
      rusqlite::params![phone],
      RawAccount::from_row,
    )
    .optional()
}

// ─── Pre-encoded insert rows ─────────────────────────────────────────────────
//
// Domain values are encoded to their column forms before entering a
// `call` closure; all fallible decimal/JSON encoding happens outside so
// closures only ever see ready-to-bind strings.

struct DeliveryRow {
  id:                     i64,
  customer_name:          String,
  customer_phone:         Option<String>,
  chick_type:             String,
  loaded_box_weight:      String,
  empty_box_weight:       String,
  net_weight:             String,
  number_of_boxes:        Option<u32>,
  notes:                  String,
  loaded_weights_list:    String,
  empty_weights_list:     String,
  order_id:               Option<i64>,
  price_per_kg:           Option<String>,
  total_amount:           Option<String>,
  account_transaction_id: Option<i64>,
  created_at:             String,
}

impl DeliveryRow {
  fn encode(d: &Delivery) -> Result<Self> {
    Ok(Self {
      id:                     d.id,
      customer_name:          d.customer_name.clone(),
      customer_phone:         d.customer_phone.clone(),
      chick_type:             d.chick_type.clone(),
      loaded_box_weight:      encode_decimal(d.loaded_box_weight),
      empty_box_weight:       encode_decimal(d.empty_box_weight),
      net_weight:             encode_decimal(d.net_weight),
      number_of_boxes:        d.number_of_boxes,
      notes:                  d.notes.clone(),
      loaded_weights_list:    encode_weights(&d.loaded_weights_list)?,
      empty_weights_list:     encode_weights(&d.empty_weights_list)?,
      order_id:               d.order_id,
      price_per_kg:           d.price_per_kg.map(encode_decimal),
      total_amount:           d.total_amount.map(encode_decimal),
      account_transaction_id: d.account_transaction_id,
      created_at:             encode_dt(d.created_at),
    })
  }

  /// Insert the row, keeping its original id when `keep_id` (restore) or
  /// letting SQLite assign a fresh one otherwise (create, merge).
  fn insert(
    &self,
    conn: &rusqlite::Connection,
    keep_id: bool,
  ) -> rusqlite::Result<i64> {
    if keep_id {
      conn.execute(
        "INSERT INTO deliveries (
           id, customer_name, customer_phone, chick_type,
           loaded_box_weight, empty_box_weight, net_weight,
           number_of_boxes, notes, loaded_weights_list, empty_weights_list,
           order_id, price_per_kg, total_amount, account_transaction_id,
           created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15, ?16)",
        rusqlite::params![
          self.id,
          self.customer_name,
          self.customer_phone,
          self.chick_type,
          self.loaded_box_weight,
          self.empty_box_weight,
          self.net_weight,
          self.number_of_boxes,
          self.notes,
          self.loaded_weights_list,
          self.empty_weights_list,
          self.order_id,
          self.price_per_kg,
          self.total_amount,
          self.account_transaction_id,
          self.created_at,
        ],
      )?;
      Ok(self.id)
    } else {
      conn.execute(
        "INSERT INTO deliveries (
           customer_name, customer_phone, chick_type,
           loaded_box_weight, empty_box_weight, net_weight,
           number_of_boxes, notes, loaded_weights_list, empty_weights_list,
           order_id, price_per_kg, total_amount, account_transaction_id,
           created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15)",
        rusqlite::params![
          self.customer_name,
          self.customer_phone,
          self.chick_type,
          self.loaded_box_weight,
          self.empty_box_weight,
          self.net_weight,
          self.number_of_boxes,
          self.notes,
          self.loaded_weights_list,
          self.empty_weights_list,
          self.order_id,
          self.price_per_kg,
          self.total_amount,
          self.account_transaction_id,
          self.created_at,
        ],
      )?;
      Ok(conn.last_insert_rowid())
    }
  }
}

struct TransactionRow {
  id:             i64,
  customer_phone: String,
  customer_name:  String,
  kind:           String,
  date:           String,
  amount:         String,
  kgs:            Option<String>,
  price_per_kg:   Option<String>,
  delivery_id:    Option<i64>,
  notes:          String,
  created_at:     String,
}

impl TransactionRow {
  fn encode(t: &Transaction) -> Self {
    Self {
      id:             t.id,
      customer_phone: t.customer_phone.clone(),
      customer_name:  t.customer_name.clone(),
      kind:           encode_txn_kind(t.kind).to_owned(),
      date:           encode_dt(t.date),
      amount:         encode_decimal(t.amount),
      kgs:            t.kgs.map(encode_decimal),
      price_per_kg:   t.price_per_kg.map(encode_decimal),
      delivery_id:    t.delivery_id,
      notes:          t.notes.clone(),
      created_at:     encode_dt(t.created_at),
    }
  }

  fn insert(
    &self,
    conn: &rusqlite::Connection,
    keep_id: bool,
  ) -> rusqlite::Result<i64> {
    if keep_id {
      conn.execute(
        "INSERT INTO transactions (
           id, customer_phone, customer_name, kind, date, amount,
           kgs, price_per_kg, delivery_id, notes, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
          self.id,
          self.customer_phone,
          self.customer_name,
          self.kind,
          self.date,
          self.amount,
          self.kgs,
          self.price_per_kg,
          self.delivery_id,
          self.notes,
          self.created_at,
        ],
      )?;
      Ok(self.id)
    } else {
      conn.execute(
        "INSERT INTO transactions (
           customer_phone, customer_name, kind, date, amount,
           kgs, price_per_kg, delivery_id, notes, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
          self.customer_phone,
          self.customer_name,
          self.kind,
          self.date,
          self.amount,
          self.kgs,
          self.price_per_kg,
          self.delivery_id,
          self.notes,
          self.created_at,
        ],
      )?;
      Ok(conn.last_insert_rowid())
    }
  }
}

struct OrderRow {
  id:             i64,
  chick_type:     String,
  quantity:       u32,
  customer_name:  String,
  customer_phone: String,
  notes:          String,
  status:         String,
  created_at:     String,
  updated_at:     String,
}

impl OrderRow {
  fn encode(o: &Order) -> Self {
    Self {
      id:             o.id,
      chick_type:     o.chick_type.clone(),
      quantity:       o.quantity,
      customer_name:  o.customer_name.clone(),
      customer_phone: o.customer_phone.clone(),
      notes:          o.notes.clone(),
      status:         encode_order_status(o.status).to_owned(),
      created_at:     encode_dt(o.created_at),
      updated_at:     encode_dt(o.updated_at),
    }
  }

  fn insert(
    &self,
    conn: &rusqlite::Connection,
    keep_id: bool,
  ) -> rusqlite::Result<i64> {
    if keep_id {
      conn.execute(
        "INSERT INTO orders (
           id, chick_type, quantity, customer_name, customer_phone,
           notes, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
          self.id,
          self.chick_type,
          self.quantity,
          self.customer_name,
          self.customer_phone,
          self.notes,
          self.status,
          self.created_at,
          self.updated_at,
        ],
      )?;
      Ok(self.id)
    } else {
      conn.execute(
        "INSERT INTO orders (
           chick_type, quantity, customer_name, customer_phone,
           notes, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
          self.chick_type,
          self.quantity,
          self.customer_name,
          self.customer_phone,
          self.notes,
          self.status,
          self.created_at,
          self.updated_at,
        ],
      )?;
      Ok(conn.last_insert_rowid())
    }
  }
}

struct AccountRow {
  id:             i64,
  customer_phone: String,
  customer_name:  String,
  total_amount:   String,
  total_paid:     String,
  outstanding:    String,
  hidden:         bool,
  created_at:     String,
  updated_at:     String,
}

impl AccountRow {
  fn encode(a: &Account) -> Self {
    Self {
      id:             a.id,
      customer_phone: a.customer_phone.clone(),
      customer_name:  a.customer_name.clone(),
      total_amount:   encode_decimal(a.total_amount),
      total_paid:     encode_decimal(a.total_paid),
      outstanding:    encode_decimal(a.outstanding_amount),
      hidden:         a.hidden,
      created_at:     encode_dt(a.created_at),
      updated_at:     encode_dt(a.updated_at),
    }
  }

  fn insert_keep_id(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO accounts (
         id, customer_phone, customer_name, total_amount, total_paid,
         outstanding, hidden, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
      rusqlite::params![
        self.id,
        self.customer_phone,
        self.customer_name,
        self.total_amount,
        self.total_paid,
        self.outstanding,
        self.hidden,
        self.created_at,
        self.updated_at,
      ],
    )?;
    Ok(())
  }
}

/// Pricing outcome as it crosses the `call` closure boundary, before the
/// delivery row has been decoded.
enum RawPriceOutcome {
  Priced(RawDelivery),
  NotFound,
  NoCustomerPhone,
}

// ─── DeliveryStore impl ──────────────────────────────────────────────────────

impl DeliveryStore for SqliteStore {
  type Error = Error;

  // ── Deliveries ────────────────────────────────────────────────────────────

  async fn list_deliveries(&self) -> Result<Vec<Delivery>> {
    let raws: Vec<RawDelivery> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM deliveries ORDER BY created_at DESC, id DESC",
          RawDelivery::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawDelivery::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDelivery::into_delivery).collect()
  }

  async fn create_delivery(&self, input: NewDelivery) -> Result<Delivery> {
    let mut delivery = Delivery {
      id:                     0,
      customer_name:          input.customer_name,
      customer_phone:         input.customer_phone,
      chick_type:             input.chick_type,
      net_weight:             input.loaded_box_weight - input.empty_box_weight,
      loaded_box_weight:      input.loaded_box_weight,
      empty_box_weight:       input.empty_box_weight,
      number_of_boxes:        input.number_of_boxes,
      notes:                  input.notes,
      loaded_weights_list:    input.loaded_weights_list,
      empty_weights_list:     input.empty_weights_list,
      order_id:               input.order_id,
      price_per_kg:           None,
      total_amount:           None,
      account_transaction_id: None,
      created_at:             Utc::now(),
    };

    let row = DeliveryRow::encode(&delivery)?;
    let id: i64 = self.conn.call(move |conn| Ok(row.insert(conn, false)?)).await?;

    delivery.id = id;
    Ok(delivery)
  }

  async fn update_delivery(
    &self,
    id: i64,
    input: NewDelivery,
  ) -> Result<Option<Delivery>> {
    let net = encode_decimal(input.net_weight());
    let loaded = encode_decimal(input.loaded_box_weight);
    let empty = encode_decimal(input.empty_box_weight);
    let loaded_list = encode_weights(&input.loaded_weights_list)?;
    let empty_list = encode_weights(&input.empty_weights_list)?;

    let raw: Option<RawDelivery> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE deliveries
           SET customer_name = ?2, customer_phone = ?3, chick_type = ?4,
               loaded_box_weight = ?5, empty_box_weight = ?6, net_weight = ?7,
               number_of_boxes = ?8, notes = ?9,
               loaded_weights_list = ?10, empty_weights_list = ?11,
               order_id = ?12
           WHERE id = ?1",
          rusqlite::params![
            id,
            input.customer_name,
            input.customer_phone,
            input.chick_type,
            loaded,
            empty,
            net,
            input.number_of_boxes,
            input.notes,
            loaded_list,
            empty_list,
            input.order_id,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_delivery(conn, id)?)
      })
      .await?;

    raw.map(RawDelivery::into_delivery).transpose()
  }

  async fn delete_delivery(&self, id: i64) -> Result<bool> {
    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM deliveries WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn delete_all_deliveries(&self) -> Result<u64> {
    let removed: usize = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM deliveries", [])?))
      .await?;
    Ok(removed as u64)
  }

  async fn delete_deliveries_on(&self, date: NaiveDate) -> Result<u64> {
    // RFC 3339 timestamps start with the calendar date.
    let day = date.format("%Y-%m-%d").to_string();
    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM deliveries WHERE substr(created_at, 1, 10) = ?1",
          rusqlite::params![day],
        )?)
      })
      .await?;
    Ok(removed as u64)
  }

  async fn price_delivery(
    &self,
    id: i64,
    price_per_kg: Decimal,
  ) -> Result<PriceOutcome> {
    let now_str = encode_dt(Utc::now());
    let price_str = encode_decimal(price_per_kg);

    let raw: RawPriceOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(delivery) = select_delivery(&tx, id)? else {
          return Ok(RawPriceOutcome::NotFound);
        };
        let Some(phone) = delivery.customer_phone.clone().filter(|p| !p.is_empty())
        else {
          return Ok(RawPriceOutcome::NoCustomerPhone);
        };

        // Re-pricing replaces the previously posted ledger entry. When the
        // delivery's phone was corrected since the last pricing, the entry
        // being replaced belongs to a different account, which must be
        // recomputed too once its entry is gone.
        let displaced: Vec<(String, String)> = {
          let mut stmt = tx.prepare(
            "SELECT DISTINCT customer_phone, customer_name FROM transactions
             WHERE delivery_id = ?1",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![id], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };
        tx.execute(
          "DELETE FROM transactions WHERE delivery_id = ?1",
          rusqlite::params![id],
        )?;

        let kgs = sql_decimal(&delivery.net_weight)?;
        let amount = kgs * price_per_kg;

        tx.execute(
          "INSERT INTO transactions (
             customer_phone, customer_name, kind, date, amount,
             kgs, price_per_kg, delivery_id, notes, created_at
           ) VALUES (?1, ?2, 'delivery', ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            phone,
            delivery.customer_name,
            delivery.created_at,
            amount.to_string(),
            delivery.net_weight,
            price_str,
            id,
            format!("Delivery #{id}"),
            now_str,
          ],
        )?;
        let txn_id = tx.last_insert_rowid();

        tx.execute(
          "UPDATE deliveries
           SET price_per_kg = ?2, total_amount = ?3, account_transaction_id = ?4
           WHERE id = ?1",
          rusqlite::params![id, price_str, amount.to_string(), txn_id],
        )?;

        recompute_totals(&tx, &phone, &delivery.customer_name, &now_str)?;
        for (old_phone, old_name) in &displaced {
          if old_phone != &phone {
            recompute_totals(&tx, old_phone, old_name, &now_str)?;
          }
        }

        let updated = select_delivery(&tx, id)?.ok_or(
          rusqlite::Error::QueryReturnedNoRows,
        )?;
        tx.commit()?;
        Ok(RawPriceOutcome::Priced(updated))
      })
      .await?;

    Ok(match raw {
      RawPriceOutcome::Priced(raw) => PriceOutcome::Priced(raw.into_delivery()?),
      RawPriceOutcome::NotFound => PriceOutcome::NotFound,
      RawPriceOutcome::NoCustomerPhone => PriceOutcome::NoCustomerPhone,
    })
  }

  // ── Orders ────────────────────────────────────────────────────────────────

  async fn list_orders(&self) -> Result<Vec<Order>> {
    let raws: Vec<RawOrder> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM orders ORDER BY created_at DESC, id DESC",
          RawOrder::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawOrder::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOrder::into_order).collect()
  }

  async fn create_order(&self, input: NewOrder) -> Result<Order> {
    let now = Utc::now();
    let mut order = Order {
      id:             0,
      chick_type:     input.chick_type,
      quantity:       input.quantity,
      customer_name:  input.customer_name,
      customer_phone: input.customer_phone,
      notes:          input.notes,
      status:         OrderStatus::Pending,
      created_at:     now,
      updated_at:     now,
    };

    let row = OrderRow::encode(&order);
    let id: i64 = self.conn.call(move |conn| Ok(row.insert(conn, false)?)).await?;

    order.id = id;
    Ok(order)
  }

  async fn update_order(
    &self,
    id: i64,
    patch: OrderPatch,
  ) -> Result<Option<Order>> {
    let status = patch.status.map(|s| encode_order_status(s).to_owned());
    let notes = patch.notes;
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawOrder> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE orders
           SET status = COALESCE(?2, status),
               notes = COALESCE(?3, notes),
               updated_at = ?4
           WHERE id = ?1",
          rusqlite::params![id, status, notes, now_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_order(conn, id)?)
      })
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }

  async fn delete_order(&self, id: i64) -> Result<bool> {
    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM orders WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn delete_all_orders(&self) -> Result<u64> {
    let removed: usize = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM orders", [])?))
      .await?;
    Ok(removed as u64)
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn get_or_create_account(&self, phone: &str, name: &str) -> Result<Account> {
    let phone = phone.to_owned();
    let name = name.to_owned();
    let now_str = encode_dt(Utc::now());

    let raw: RawAccount = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (customer_phone, customer_name, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?3)
           ON CONFLICT(customer_phone) DO NOTHING",
          rusqlite::params![phone, name, now_str],
        )?;
        select_account(conn, &phone)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows.into())
      })
      .await?;

    raw.into_account()
  }

  async fn get_account(&self, phone: &str) -> Result<Option<Account>> {
    let phone = phone.to_owned();
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| Ok(select_account(conn, &phone)?))
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn list_accounts(&self, include_hidden: bool) -> Result<Vec<Account>> {
    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let sql = if include_hidden {
          format!(
            "SELECT {} FROM accounts ORDER BY updated_at DESC, id DESC",
            RawAccount::COLUMNS
          )
        } else {
          format!(
            "SELECT {} FROM accounts WHERE hidden = 0 \
             ORDER BY updated_at DESC, id DESC",
            RawAccount::COLUMNS
          )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }

  async fn hidden_accounts(&self) -> Result<Vec<Account>> {
    let raws: Vec<RawAccount> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM accounts WHERE hidden = 1 \
           ORDER BY updated_at DESC, id DESC",
          RawAccount::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }

  async fn toggle_account_visibility(&self, phone: &str) -> Result<Option<Account>> {
    let phone = phone.to_owned();
    let now_str = encode_dt(Utc::now());

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE accounts SET hidden = 1 - hidden, updated_at = ?2
           WHERE customer_phone = ?1",
          rusqlite::params![phone, now_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_account(conn, &phone)?)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Transaction log ───────────────────────────────────────────────────────

  async fn add_delivery_entry(&self, input: NewDeliveryEntry) -> Result<Transaction> {
    let mut txn = Transaction {
      id:             0,
      customer_phone: input.customer_phone,
      customer_name:  input.customer_name,
      kind:           TransactionKind::Delivery,
      date:           input.date,
      amount:         input.kgs * input.price_per_kg,
      kgs:            Some(input.kgs),
      price_per_kg:   Some(input.price_per_kg),
      delivery_id:    input.delivery_id,
      notes:          input.notes,
      created_at:     Utc::now(),
    };
    txn.id = self.insert_ledger_entry(&txn).await?;
    Ok(txn)
  }

  async fn add_payment(&self, input: NewPayment) -> Result<Transaction> {
    let mut txn = Transaction {
      id:             0,
      customer_phone: input.customer_phone,
      customer_name:  input.customer_name,
      kind:           TransactionKind::Payment,
      date:           input.date,
      amount:         input.amount,
      kgs:            None,
      price_per_kg:   None,
      delivery_id:    None,
      notes:          input.notes,
      created_at:     Utc::now(),
    };
    txn.id = self.insert_ledger_entry(&txn).await?;
    Ok(txn)
  }

  async fn transactions(&self, phone: &str) -> Result<Vec<Transaction>> {
    let phone = phone.to_owned();
    let raws: Vec<RawTransaction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM transactions WHERE customer_phone = ?1 \
           ORDER BY date DESC, id DESC",
          RawTransaction::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![phone], RawTransaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransaction::into_transaction).collect()
  }

  async fn update_transaction(
    &self,
    id: i64,
    patch: TransactionPatch,
  ) -> Result<Option<Transaction>> {
    let now_str = encode_dt(Utc::now());

    let updated: Option<Transaction> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(raw) = tx
          .query_row(
            &format!(
              "SELECT {} FROM transactions WHERE id = ?1",
              RawTransaction::COLUMNS
            ),
            rusqlite::params![id],
            RawTransaction::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };

        let mut txn = Transaction {
          id:             raw.id,
          customer_phone: raw.customer_phone,
          customer_name:  raw.customer_name,
          kind:           sql_txn_kind(&raw.kind)?,
          date:           sql_dt(&raw.date)?,
          amount:         sql_decimal(&raw.amount)?,
          kgs:            raw.kgs.as_deref().map(sql_decimal).transpose()?,
          price_per_kg:   raw
            .price_per_kg
            .as_deref()
            .map(sql_decimal)
            .transpose()?,
          delivery_id:    raw.delivery_id,
          notes:          raw.notes,
          created_at:     sql_dt(&raw.created_at)?,
        };
        patch.apply(&mut txn);

        tx.execute(
          "UPDATE transactions
           SET customer_name = ?2, date = ?3, amount = ?4,
               kgs = ?5, price_per_kg = ?6, notes = ?7
           WHERE id = ?1",
          rusqlite::params![
            id,
            txn.customer_name,
            encode_dt(txn.date),
            txn.amount.to_string(),
            txn.kgs.map(|d| d.to_string()),
            txn.price_per_kg.map(|d| d.to_string()),
            txn.notes,
          ],
        )?;

        recompute_totals(&tx, &txn.customer_phone, &txn.customer_name, &now_str)?;
        tx.commit()?;
        Ok(Some(txn))
      })
      .await?;

    Ok(updated)
  }

  async fn delete_transaction(&self, id: i64) -> Result<bool> {
    let now_str = encode_dt(Utc::now());

    let removed: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let owner: Option<(String, String)> = tx
          .query_row(
            "SELECT customer_phone, customer_name FROM transactions WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((phone, name)) = owner else {
          return Ok(false);
        };

        tx.execute("DELETE FROM transactions WHERE id = ?1", rusqlite::params![id])?;
        // A pricing link back from the delivery record would now dangle.
        tx.execute(
          "UPDATE deliveries SET account_transaction_id = NULL
           WHERE account_transaction_id = ?1",
          rusqlite::params![id],
        )?;

        recompute_totals(&tx, &phone, &name, &now_str)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(removed)
  }

  // ── Backups ───────────────────────────────────────────────────────────────

  async fn create_backup(&self, kind: BackupKind) -> Result<SnapshotMeta> {
    // One closure reads all four datasets, so the snapshot is a single
    // point-in-time view.
    let (deliveries, orders, accounts, transactions): (
      Vec<RawDelivery>,
      Vec<RawOrder>,
      Vec<RawAccount>,
      Vec<RawTransaction>,
    ) = self
      .conn
      .call(|conn| {
        let deliveries = conn
          .prepare(&format!(
            "SELECT {} FROM deliveries ORDER BY id",
            RawDelivery::COLUMNS
          ))?
          .query_map([], RawDelivery::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let orders = conn
          .prepare(&format!("SELECT {} FROM orders ORDER BY id", RawOrder::COLUMNS))?
          .query_map([], RawOrder::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let accounts = conn
          .prepare(&format!(
            "SELECT {} FROM accounts ORDER BY id",
            RawAccount::COLUMNS
          ))?
          .query_map([], RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let transactions = conn
          .prepare(&format!(
            "SELECT {} FROM transactions ORDER BY id",
            RawTransaction::COLUMNS
          ))?
          .query_map([], RawTransaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((deliveries, orders, accounts, transactions))
      })
      .await?;

    let payload = SnapshotPayload::new(
      deliveries
        .into_iter()
        .map(RawDelivery::into_delivery)
        .collect::<Result<_>>()?,
      orders.into_iter().map(RawOrder::into_order).collect::<Result<_>>()?,
      accounts
        .into_iter()
        .map(RawAccount::into_account)
        .collect::<Result<_>>()?,
      transactions
        .into_iter()
        .map(RawTransaction::into_transaction)
        .collect::<Result<_>>()?,
    );

    let now = Utc::now();
    let filename = format!("backup-{}.json", now.format("%Y-%m-%dT%H-%M-%S-%6fZ"));
    let json = serde_json::to_string(&payload)?;

    let meta = SnapshotMeta {
      filename:   filename.clone(),
      kind,
      counts:     payload.counts,
      size:       json.len() as u64,
      created_at: now,
    };

    let kind_str = encode_backup_kind(kind).to_owned();
    let now_str = encode_dt(now);
    let cutoff_str = encode_dt(now - Duration::days(RETENTION_DAYS));
    let counts = payload.counts;
    let size = meta.size;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO backups (
             filename, kind, payload, deliveries_count, orders_count,
             size, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            filename,
            kind_str,
            json,
            counts.deliveries,
            counts.orders,
            size,
            now_str,
          ],
        )?;
        // Automatic backups double as the retention hook.
        if kind_str == "automatic" {
          conn.execute(
            "DELETE FROM backups WHERE created_at < ?1",
            rusqlite::params![cutoff_str],
          )?;
        }
        Ok(())
      })
      .await?;

    Ok(meta)
  }

  async fn list_backups(&self) -> Result<Vec<SnapshotMeta>> {
    let raws: Vec<RawBackupMeta> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM backups ORDER BY created_at DESC LIMIT ?1",
          RawBackupMeta::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![LIST_CAP as i64], RawBackupMeta::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBackupMeta::into_meta).collect()
  }

  async fn get_backup(&self, filename: &str) -> Result<Option<SnapshotPayload>> {
    let filename = filename.to_owned();
    let json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT payload FROM backups WHERE filename = ?1",
              rusqlite::params![filename],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    json.as_deref().map(serde_json::from_str).transpose().map_err(Error::Json)
  }

  async fn restore_backup(&self, filename: &str) -> Result<Option<RestoreReport>> {
    let Some(payload) = self.get_backup(filename).await? else {
      return Ok(None);
    };
    Ok(Some(self.restore_from_data(payload).await?))
  }

  async fn restore_from_data(&self, payload: SnapshotPayload) -> Result<RestoreReport> {
    let report = RestoreReport {
      deliveries_restored: payload.deliveries.len(),
      orders_restored:     payload.orders.len(),
    };

    let deliveries = payload
      .deliveries
      .iter()
      .map(DeliveryRow::encode)
      .collect::<Result<Vec<_>>>()?;
    let orders: Vec<_> = payload.orders.iter().map(OrderRow::encode).collect();
    let accounts: Vec<_> = payload.accounts.iter().map(AccountRow::encode).collect();
    let transactions: Vec<_> =
      payload.transactions.iter().map(TransactionRow::encode).collect();

    // Snapshots from before ledger inclusion leave the ledger untouched.
    let replace_ledger = payload.version == SNAPSHOT_VERSION;

    // phone -> customer name, for recomputing restored accounts.
    let mut names: HashMap<String, String> = HashMap::new();
    for a in &payload.accounts {
      names.insert(a.customer_phone.clone(), a.customer_name.clone());
    }
    for t in &payload.transactions {
      names
        .entry(t.customer_phone.clone())
        .or_insert_with(|| t.customer_name.clone());
    }

    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM deliveries", [])?;
        tx.execute("DELETE FROM orders", [])?;
        for row in &deliveries {
          row.insert(&tx, true)?;
        }
        for row in &orders {
          row.insert(&tx, true)?;
        }

        if replace_ledger {
          tx.execute("DELETE FROM transactions", [])?;
          tx.execute("DELETE FROM accounts", [])?;
          for row in &accounts {
            row.insert_keep_id(&tx)?;
          }
          for row in &transactions {
            row.insert(&tx, true)?;
          }
          for (phone, name) in &names {
            recompute_totals(&tx, phone, name, &now_str)?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(report)
  }

  async fn merge_from_data(&self, payload: SnapshotPayload) -> Result<MergeReport> {
    let report = MergeReport {
      deliveries_added: payload.deliveries.len(),
      orders_added:     payload.orders.len(),
    };

    // The snapshot's pricing links name transaction ids from the source
    // store; inserting them as-is could alias unrelated entries here. Rows
    // go in unlinked and the remap pass re-establishes what it can.
    let deliveries = payload
      .deliveries
      .iter()
      .map(|d| {
        let mut row = DeliveryRow::encode(d)?;
        let old_link = row.account_transaction_id.take();
        Ok((d.id, old_link, row))
      })
      .collect::<Result<Vec<(i64, Option<i64>, DeliveryRow)>>>()?;
    let orders: Vec<_> = payload.orders.iter().map(OrderRow::encode).collect();
    let transactions: Vec<_> = payload
      .transactions
      .iter()
      .map(|t| (t.id, TransactionRow::encode(t)))
      .collect();
    let accounts: Vec<(String, String)> = payload
      .accounts
      .iter()
      .map(|a| (a.customer_phone.clone(), a.customer_name.clone()))
      .collect();

    let mut phones: HashMap<String, String> = accounts.iter().cloned().collect();
    for t in &payload.transactions {
      phones
        .entry(t.customer_phone.clone())
        .or_insert_with(|| t.customer_name.clone());
    }

    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Every incoming record gets a fresh id; the maps rewrite the
        // cross-references that named the old ones.
        let mut delivery_ids: HashMap<i64, i64> = HashMap::new();
        for (old_id, _, row) in &deliveries {
          let new_id = row.insert(&tx, false)?;
          delivery_ids.insert(*old_id, new_id);
        }

        let mut txn_ids: HashMap<i64, i64> = HashMap::new();
        for (old_id, row) in &transactions {
          let new_id = tx.execute(
            "INSERT INTO transactions (
               customer_phone, customer_name, kind, date, amount,
               kgs, price_per_kg, delivery_id, notes, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
              row.customer_phone,
              row.customer_name,
              row.kind,
              row.date,
              row.amount,
              row.kgs,
              row.price_per_kg,
              row.delivery_id.and_then(|d| delivery_ids.get(&d).copied()),
              row.notes,
              row.created_at,
            ],
          )
          .map(|_| tx.last_insert_rowid())?;
          txn_ids.insert(*old_id, new_id);
        }

        for (old_delivery_id, old_link, _) in &deliveries {
          if let Some(old_txn_id) = *old_link
            && let Some(new_txn_id) = txn_ids.get(&old_txn_id)
            && let Some(new_delivery_id) = delivery_ids.get(old_delivery_id)
          {
            tx.execute(
              "UPDATE deliveries SET account_transaction_id = ?2 WHERE id = ?1",
              rusqlite::params![new_delivery_id, new_txn_id],
            )?;
          }
        }

        for row in &orders {
          row.insert(&tx, false)?;
        }

        for (phone, name) in &phones {
          recompute_totals(&tx, phone, name, &now_str)?;
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(report)
  }

  async fn delete_backup(&self, filename: &str) -> Result<bool> {
    let filename = filename.to_owned();
    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM backups WHERE filename = ?1",
          rusqlite::params![filename],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn prune_backups(&self, older_than: DateTime<Utc>) -> Result<u64> {
    let cutoff = encode_dt(older_than);
    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM backups WHERE created_at < ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await?;
    Ok(removed as u64)
  }
}

impl SqliteStore {
  /// Insert one ledger entry and recompute the owning account's totals in
  /// a single SQLite transaction. Returns the assigned id.
  async fn insert_ledger_entry(&self, txn: &Transaction) -> Result<i64> {
    let row = TransactionRow::encode(txn);
    let now_str = encode_dt(Utc::now());

    let id: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id = row.insert(&tx, false)?;
        recompute_totals(&tx, &row.customer_phone, &row.customer_name, &now_str)?;
        tx.commit()?;
        Ok(id)
      })
      .await?;

    Ok(id)
  }

  /// Rewrite a stored backup's `created_at`, to exercise retention.
  #[cfg(test)]
  pub(crate) async fn backdate_backup(
    &self,
    filename: &str,
    created_at: DateTime<Utc>,
  ) -> Result<()> {
    let filename = filename.to_owned();
    let ts = encode_dt(created_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE backups SET created_at = ?1 WHERE filename = ?2",
          rusqlite::params![ts, filename],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
