//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, decimals are canonical decimal
//! strings, weight lists are compact JSON arrays. The `sql_*` variants
//! map failures into `rusqlite::Error` so they can be used inside
//! `tokio_rusqlite` closures (mid-transaction), where only rusqlite
//! errors can propagate.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use roost_core::{
  account::Account,
  backup::{BackupKind, SnapshotCounts, SnapshotMeta},
  delivery::Delivery,
  order::{Order, OrderStatus},
  transaction::{Transaction, TransactionKind},
};
use rust_decimal::Decimal;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String {
  d.to_string()
}

pub fn decode_decimal(s: &str) -> Result<Decimal> {
  Decimal::from_str(s).map_err(|e| Error::DecimalParse(e.to_string()))
}

/// Decimal decode usable inside a `tokio_rusqlite` closure.
pub fn sql_decimal(s: &str) -> rusqlite::Result<Decimal> {
  Decimal::from_str(s).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(
      0,
      rusqlite::types::Type::Text,
      Box::new(e),
    )
  })
}

/// RFC 3339 decode usable inside a `tokio_rusqlite` closure.
pub fn sql_dt(s: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(e),
      )
    })
}

/// Transaction kind decode usable inside a `tokio_rusqlite` closure.
pub fn sql_txn_kind(s: &str) -> rusqlite::Result<TransactionKind> {
  decode_txn_kind(s).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(
      0,
      rusqlite::types::Type::Text,
      Box::new(e),
    )
  })
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn encode_txn_kind(k: TransactionKind) -> &'static str {
  match k {
    TransactionKind::Delivery => "delivery",
    TransactionKind::Payment => "payment",
  }
}

pub fn decode_txn_kind(s: &str) -> Result<TransactionKind> {
  match s {
    "delivery" => Ok(TransactionKind::Delivery),
    "payment" => Ok(TransactionKind::Payment),
    other => Err(Error::UnknownDiscriminant(other.to_string())),
  }
}

pub fn encode_order_status(s: OrderStatus) -> &'static str {
  match s {
    OrderStatus::Pending => "pending",
    OrderStatus::Confirmed => "confirmed",
    OrderStatus::Completed => "completed",
    OrderStatus::Cancelled => "cancelled",
  }
}

pub fn decode_order_status(s: &str) -> Result<OrderStatus> {
  match s {
    "pending" => Ok(OrderStatus::Pending),
    "confirmed" => Ok(OrderStatus::Confirmed),
    "completed" => Ok(OrderStatus::Completed),
    "cancelled" => Ok(OrderStatus::Cancelled),
    other => Err(Error::UnknownDiscriminant(other.to_string())),
  }
}

pub fn encode_backup_kind(k: BackupKind) -> &'static str {
  match k {
    BackupKind::Manual => "manual",
    BackupKind::Automatic => "automatic",
  }
}

pub fn decode_backup_kind(s: &str) -> Result<BackupKind> {
  match s {
    "manual" => Ok(BackupKind::Manual),
    "automatic" => Ok(BackupKind::Automatic),
    other => Err(Error::UnknownDiscriminant(other.to_string())),
  }
}

// ─── Weight lists ────────────────────────────────────────────────────────────

pub fn encode_weights(w: &[Decimal]) -> Result<String> {
  Ok(serde_json::to_string(w)?)
}

pub fn decode_weights(s: &str) -> Result<Vec<Decimal>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `deliveries` row.
pub struct RawDelivery {
  pub id:                     i64,
  pub customer_name:          String,
  pub customer_phone:         Option<String>,
  pub chick_type:             String,
  pub loaded_box_weight:      String,
  pub empty_box_weight:       String,
  pub net_weight:             String,
  pub number_of_boxes:        Option<u32>,
  pub notes:                  String,
  pub loaded_weights_list:    String,
  pub empty_weights_list:     String,
  pub order_id:               Option<i64>,
  pub price_per_kg:           Option<String>,
  pub total_amount:           Option<String>,
  pub account_transaction_id: Option<i64>,
  pub created_at:             String,
}

impl RawDelivery {
  /// Column list matching [`Self::from_row`]; keep the two in sync.
  pub const COLUMNS: &'static str = "id, customer_name, customer_phone, \
     chick_type, loaded_box_weight, empty_box_weight, net_weight, \
     number_of_boxes, notes, loaded_weights_list, empty_weights_list, \
     order_id, price_per_kg, total_amount, account_transaction_id, \
     created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                     row.get(0)?,
      customer_name:          row.get(1)?,
      customer_phone:         row.get(2)?,
      chick_type:             row.get(3)?,
      loaded_box_weight:      row.get(4)?,
      empty_box_weight:       row.get(5)?,
      net_weight:             row.get(6)?,
      number_of_boxes:        row.get(7)?,
      notes:                  row.get(8)?,
      loaded_weights_list:    row.get(9)?,
      empty_weights_list:     row.get(10)?,
      order_id:               row.get(11)?,
      price_per_kg:           row.get(12)?,
      total_amount:           row.get(13)?,
      account_transaction_id: row.get(14)?,
      created_at:             row.get(15)?,
    })
  }

  pub fn into_delivery(self) -> Result<Delivery> {
    Ok(Delivery {
      id:                     self.id,
      customer_name:          self.customer_name,
      customer_phone:         self.customer_phone,
      chick_type:             self.chick_type,
      loaded_box_weight:      decode_decimal(&self.loaded_box_weight)?,
      empty_box_weight:       decode_decimal(&self.empty_box_weight)?,
      net_weight:             decode_decimal(&self.net_weight)?,
      number_of_boxes:        self.number_of_boxes,
      notes:                  self.notes,
      loaded_weights_list:    decode_weights(&self.loaded_weights_list)?,
      empty_weights_list:     decode_weights(&self.empty_weights_list)?,
      order_id:               self.order_id,
      price_per_kg:           self
        .price_per_kg
        .as_deref()
        .map(decode_decimal)
        .transpose()?,
      total_amount:           self
        .total_amount
        .as_deref()
        .map(decode_decimal)
        .transpose()?,
      account_transaction_id: self.account_transaction_id,
      created_at:             decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `orders` row.
pub struct RawOrder {
  pub id:             i64,
  pub chick_type:     String,
  pub quantity:       u32,
  pub customer_name:  String,
  pub customer_phone: String,
  pub notes:          String,
  pub status:         String,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawOrder {
  pub const COLUMNS: &'static str = "id, chick_type, quantity, \
     customer_name, customer_phone, notes, status, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      chick_type:     row.get(1)?,
      quantity:       row.get(2)?,
      customer_name:  row.get(3)?,
      customer_phone: row.get(4)?,
      notes:          row.get(5)?,
      status:         row.get(6)?,
      created_at:     row.get(7)?,
      updated_at:     row.get(8)?,
    })
  }

  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      id:             self.id,
      chick_type:     self.chick_type,
      quantity:       self.quantity,
      customer_name:  self.customer_name,
      customer_phone: self.customer_phone,
      notes:          self.notes,
      status:         decode_order_status(&self.status)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub id:             i64,
  pub customer_phone: String,
  pub customer_name:  String,
  pub total_amount:   String,
  pub total_paid:     String,
  pub outstanding:    String,
  pub hidden:         bool,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawAccount {
  pub const COLUMNS: &'static str = "id, customer_phone, customer_name, \
     total_amount, total_paid, outstanding, hidden, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      customer_phone: row.get(1)?,
      customer_name:  row.get(2)?,
      total_amount:   row.get(3)?,
      total_paid:     row.get(4)?,
      outstanding:    row.get(5)?,
      hidden:         row.get(6)?,
      created_at:     row.get(7)?,
      updated_at:     row.get(8)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      id:                 self.id,
      customer_phone:     self.customer_phone,
      customer_name:      self.customer_name,
      total_amount:       decode_decimal(&self.total_amount)?,
      total_paid:         decode_decimal(&self.total_paid)?,
      outstanding_amount: decode_decimal(&self.outstanding)?,
      hidden:             self.hidden,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `transactions` row.
pub struct RawTransaction {
  pub id:             i64,
  pub customer_phone: String,
  pub customer_name:  String,
  pub kind:           String,
  pub date:           String,
  pub amount:         String,
  pub kgs:            Option<String>,
  pub price_per_kg:   Option<String>,
  pub delivery_id:    Option<i64>,
  pub notes:          String,
  pub created_at:     String,
}

impl RawTransaction {
  pub const COLUMNS: &'static str = "id, customer_phone, customer_name, \
     kind, date, amount, kgs, price_per_kg, delivery_id, notes, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      customer_phone: row.get(1)?,
      customer_name:  row.get(2)?,
      kind:           row.get(3)?,
      date:           row.get(4)?,
      amount:         row.get(5)?,
      kgs:            row.get(6)?,
      price_per_kg:   row.get(7)?,
      delivery_id:    row.get(8)?,
      notes:          row.get(9)?,
      created_at:     row.get(10)?,
    })
  }

  pub fn into_transaction(self) -> Result<Transaction> {
    Ok(Transaction {
      id:             self.id,
      customer_phone: self.customer_phone,
      customer_name:  self.customer_name,
      kind:           decode_txn_kind(&self.kind)?,
      date:           decode_dt(&self.date)?,
      amount:         decode_decimal(&self.amount)?,
      kgs:            self.kgs.as_deref().map(decode_decimal).transpose()?,
      price_per_kg:   self
        .price_per_kg
        .as_deref()
        .map(decode_decimal)
        .transpose()?,
      delivery_id:    self.delivery_id,
      notes:          self.notes,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `backups` row, payload column excluded.
pub struct RawBackupMeta {
  pub filename:         String,
  pub kind:             String,
  pub deliveries_count: usize,
  pub orders_count:     usize,
  pub size:             u64,
  pub created_at:       String,
}

impl RawBackupMeta {
  pub const COLUMNS: &'static str =
    "filename, kind, deliveries_count, orders_count, size, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      filename:         row.get(0)?,
      kind:             row.get(1)?,
      deliveries_count: row.get(2)?,
      orders_count:     row.get(3)?,
      size:             row.get(4)?,
      created_at:       row.get(5)?,
    })
  }

  pub fn into_meta(self) -> Result<SnapshotMeta> {
    Ok(SnapshotMeta {
      filename:   self.filename,
      kind:       decode_backup_kind(&self.kind)?,
      counts:     SnapshotCounts {
        deliveries: self.deliveries_count,
        orders:     self.orders_count,
      },
      size:       self.size,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
