//! Transaction — a single ledger entry, either a `delivery` (receivable)
//! or a `payment` (receipt).
//!
//! Transactions are immutable in identity (`id`) but mutable in content via
//! explicit update. Every mutation must be followed by a recomputation of
//! the owning account's totals; the store enforces this.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discriminant for the two ledger entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Delivery,
  Payment,
}

/// One ledger entry.
///
/// `date` is the effective date and governs ordering; `created_at` is the
/// record creation timestamp. Delivery entries carry `kgs` and
/// `price_per_kg` with the invariant `amount = kgs * price_per_kg`, and an
/// optional `delivery_id` linking back to the delivery record that
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id:             i64,
  pub customer_phone: String,
  pub customer_name:  String,
  #[serde(rename = "type")]
  pub kind:           TransactionKind,
  pub date:           DateTime<Utc>,
  pub amount:         Decimal,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kgs:            Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price_per_kg:   Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub delivery_id:    Option<i64>,
  #[serde(default)]
  pub notes:          String,
  pub created_at:     DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input for a new `delivery`-kind ledger entry. The amount is always
/// computed from `kgs * price_per_kg`, never accepted from the caller.
#[derive(Debug, Clone)]
pub struct NewDeliveryEntry {
  pub customer_phone: String,
  pub customer_name:  String,
  pub date:           DateTime<Utc>,
  pub kgs:            Decimal,
  pub price_per_kg:   Decimal,
  pub notes:          String,
  pub delivery_id:    Option<i64>,
}

impl NewDeliveryEntry {
  pub fn amount(&self) -> Decimal {
    self.kgs * self.price_per_kg
  }
}

/// Input for a new `payment`-kind ledger entry.
#[derive(Debug, Clone)]
pub struct NewPayment {
  pub customer_phone: String,
  pub customer_name:  String,
  pub date:           DateTime<Utc>,
  pub amount:         Decimal,
  pub notes:          String,
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// Shallow-merge update for an existing transaction. Absent fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
  pub customer_name: Option<String>,
  pub date:          Option<DateTime<Utc>>,
  pub kgs:           Option<Decimal>,
  pub price_per_kg:  Option<Decimal>,
  pub amount:        Option<Decimal>,
  pub notes:         Option<String>,
}

impl TransactionPatch {
  /// Apply the patch in place.
  ///
  /// For delivery entries the amount is re-derived from the (possibly
  /// patched) `kgs` and `price_per_kg` whenever both are present, so the
  /// `amount = kgs * price_per_kg` invariant survives any combination of
  /// patched fields.
  pub fn apply(&self, txn: &mut Transaction) {
    if let Some(name) = &self.customer_name {
      txn.customer_name = name.clone();
    }
    if let Some(date) = self.date {
      txn.date = date;
    }
    if let Some(kgs) = self.kgs {
      txn.kgs = Some(kgs);
    }
    if let Some(price) = self.price_per_kg {
      txn.price_per_kg = Some(price);
    }
    if let Some(amount) = self.amount {
      txn.amount = amount;
    }
    if let Some(notes) = &self.notes {
      txn.notes = notes.clone();
    }

    if txn.kind == TransactionKind::Delivery
      && let (Some(kgs), Some(price)) = (txn.kgs, txn.price_per_kg)
    {
      txn.amount = kgs * price;
    }
  }
}

// ─── Date parsing ────────────────────────────────────────────────────────────

/// Parse an effective date as sent by clients: full RFC 3339, or a bare
/// `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_effective_date(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
  Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use rust_decimal::Decimal;

  use super::*;

  fn delivery_txn() -> Transaction {
    Transaction {
      id:             7,
      customer_phone: "9999999999".into(),
      customer_name:  "Asha".into(),
      kind:           TransactionKind::Delivery,
      date:           Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      amount:         Decimal::from(500),
      kgs:            Some(Decimal::from(10)),
      price_per_kg:   Some(Decimal::from(50)),
      delivery_id:    None,
      notes:          String::new(),
      created_at:     Utc::now(),
    }
  }

  #[test]
  fn new_delivery_entry_amount_is_kgs_times_price() {
    let entry = NewDeliveryEntry {
      customer_phone: "9999999999".into(),
      customer_name:  "Asha".into(),
      date:           Utc::now(),
      kgs:            "10.5".parse().unwrap(),
      price_per_kg:   Decimal::from(50),
      notes:          String::new(),
      delivery_id:    None,
    };
    assert_eq!(entry.amount(), Decimal::new(525, 0));
  }

  #[test]
  fn patch_kgs_rederives_amount() {
    let mut txn = delivery_txn();
    let patch = TransactionPatch {
      kgs: Some(Decimal::from(12)),
      ..Default::default()
    };
    patch.apply(&mut txn);
    assert_eq!(txn.amount, Decimal::from(600));
  }

  #[test]
  fn patch_amount_on_delivery_is_overridden_by_invariant() {
    let mut txn = delivery_txn();
    let patch = TransactionPatch {
      amount: Some(Decimal::from(999)),
      ..Default::default()
    };
    patch.apply(&mut txn);
    // amount = kgs * price_per_kg always wins for delivery entries
    assert_eq!(txn.amount, Decimal::from(500));
  }

  #[test]
  fn patch_amount_on_payment_applies_directly() {
    let mut txn = delivery_txn();
    txn.kind = TransactionKind::Payment;
    txn.kgs = None;
    txn.price_per_kg = None;
    let patch = TransactionPatch {
      amount: Some(Decimal::from(250)),
      ..Default::default()
    };
    patch.apply(&mut txn);
    assert_eq!(txn.amount, Decimal::from(250));
  }

  #[test]
  fn effective_date_accepts_rfc3339_and_bare_dates() {
    let bare = parse_effective_date("2024-01-01").unwrap();
    assert_eq!(bare, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

    let full = parse_effective_date("2024-01-02T10:30:00+05:30").unwrap();
    assert_eq!(full, Utc.with_ymd_and_hms(2024, 1, 2, 5, 0, 0).unwrap());

    assert!(parse_effective_date("yesterday").is_none());
  }

  #[test]
  fn wire_form_uses_type_and_camel_case() {
    let json = serde_json::to_value(delivery_txn()).unwrap();
    assert_eq!(json["type"], "delivery");
    assert_eq!(json["customerPhone"], "9999999999");
    assert_eq!(json["pricePerKg"], "50");
  }
}
