//! Account — the per-customer running ledger balance.
//!
//! An account stores no transaction detail of its own. Its totals are
//! re-derived from the full transaction log on every ledger write, so
//! `outstanding_amount == total_amount - total_paid` can never silently
//! drift after an out-of-band edit, delete, or restore.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::transaction::{Transaction, TransactionKind};

/// One ledger account, keyed by customer phone.
///
/// Accounts are created lazily on first transaction or explicit
/// registration and are never deleted, only hidden/unhidden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
  pub id:                 i64,
  pub customer_phone:     String,
  pub customer_name:      String,
  pub total_amount:       Decimal,
  pub total_paid:         Decimal,
  pub outstanding_amount: Decimal,
  pub hidden:             bool,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Totals derived from a customer's full transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountTotals {
  pub total_amount: Decimal,
  pub total_paid:   Decimal,
}

impl AccountTotals {
  /// Fold one ledger entry into the running totals.
  pub fn record(&mut self, kind: TransactionKind, amount: Decimal) {
    match kind {
      TransactionKind::Delivery => self.total_amount += amount,
      TransactionKind::Payment => self.total_paid += amount,
    }
  }

  /// Sum delivery amounts into `total_amount` and payment amounts into
  /// `total_paid`.
  pub fn from_transactions<'a>(
    txns: impl IntoIterator<Item = &'a Transaction>,
  ) -> Self {
    let mut totals = Self::default();
    for t in txns {
      totals.record(t.kind, t.amount);
    }
    totals
  }

  /// `total_amount - total_paid`; positive means the customer owes money.
  pub fn outstanding(&self) -> Decimal {
    self.total_amount - self.total_paid
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use rust_decimal::Decimal;

  use super::*;
  use crate::transaction::{Transaction, TransactionKind};

  fn txn(kind: TransactionKind, amount: &str) -> Transaction {
    Transaction {
      id:             1,
      customer_phone: "9999999999".into(),
      customer_name:  "Asha".into(),
      kind,
      date:           Utc::now(),
      amount:         amount.parse().unwrap(),
      kgs:            None,
      price_per_kg:   None,
      delivery_id:    None,
      notes:          String::new(),
      created_at:     Utc::now(),
    }
  }

  #[test]
  fn totals_from_empty_history_are_zero() {
    let totals = AccountTotals::from_transactions([]);
    assert_eq!(totals.total_amount, Decimal::ZERO);
    assert_eq!(totals.total_paid, Decimal::ZERO);
    assert_eq!(totals.outstanding(), Decimal::ZERO);
  }

  #[test]
  fn totals_split_by_kind() {
    let txns = vec![
      txn(TransactionKind::Delivery, "500"),
      txn(TransactionKind::Payment, "200"),
      txn(TransactionKind::Delivery, "125.50"),
    ];
    let totals = AccountTotals::from_transactions(&txns);
    assert_eq!(totals.total_amount, "625.50".parse::<Decimal>().unwrap());
    assert_eq!(totals.total_paid, Decimal::from(200));
    assert_eq!(totals.outstanding(), "425.50".parse::<Decimal>().unwrap());
  }

  #[test]
  fn outstanding_can_go_negative() {
    let txns = vec![txn(TransactionKind::Payment, "200")];
    let totals = AccountTotals::from_transactions(&txns);
    assert_eq!(totals.outstanding(), Decimal::from(-200));
  }

  #[test]
  fn decimal_sums_do_not_drift() {
    // 0.1 + 0.2 style accumulation must stay exact.
    let txns: Vec<_> =
      (0..1000).map(|_| txn(TransactionKind::Delivery, "0.10")).collect();
    let totals = AccountTotals::from_transactions(&txns);
    assert_eq!(totals.total_amount, Decimal::from(100));
  }
}
