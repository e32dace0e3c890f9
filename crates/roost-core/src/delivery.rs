//! Delivery — one weighed box delivery to a customer.
//!
//! Weights are recorded as loaded/empty box totals; the billable net
//! weight is their difference. Attaching a price to a delivery posts a
//! single `delivery`-kind ledger transaction for it; re-pricing replaces
//! that transaction rather than adding a second one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
  pub id:                     i64,
  pub customer_name:          String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub customer_phone:         Option<String>,
  pub chick_type:             String,
  pub loaded_box_weight:      Decimal,
  pub empty_box_weight:       Decimal,
  pub net_weight:             Decimal,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub number_of_boxes:        Option<u32>,
  #[serde(default)]
  pub notes:                  String,
  #[serde(default)]
  pub loaded_weights_list:    Vec<Decimal>,
  #[serde(default)]
  pub empty_weights_list:     Vec<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_id:               Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price_per_kg:           Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_amount:           Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub account_transaction_id: Option<i64>,
  pub created_at:             DateTime<Utc>,
}

/// Input for creating or replacing a delivery record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDelivery {
  pub customer_name:       String,
  #[serde(default)]
  pub customer_phone:      Option<String>,
  pub chick_type:          String,
  pub loaded_box_weight:   Decimal,
  pub empty_box_weight:    Decimal,
  #[serde(default)]
  pub number_of_boxes:     Option<u32>,
  #[serde(default)]
  pub notes:               String,
  #[serde(default)]
  pub loaded_weights_list: Vec<Decimal>,
  #[serde(default)]
  pub empty_weights_list:  Vec<Decimal>,
  #[serde(default)]
  pub order_id:            Option<i64>,
}

impl NewDelivery {
  /// Billable weight: loaded minus empty box weight.
  pub fn net_weight(&self) -> Decimal {
    self.loaded_box_weight - self.empty_box_weight
  }
}

/// Result of a pricing attempt on a delivery.
#[derive(Debug, Clone)]
pub enum PriceOutcome {
  /// The price was attached and a linked ledger entry posted.
  Priced(Delivery),
  /// No delivery with the given id exists.
  NotFound,
  /// The delivery has no customer phone to post a ledger entry against.
  NoCustomerPhone,
}

#[cfg(test)]
mod tests {
  use rust_decimal::Decimal;

  use super::*;

  #[test]
  fn net_weight_is_loaded_minus_empty() {
    let input = NewDelivery {
      customer_name:       "Asha".into(),
      customer_phone:      Some("9999999999".into()),
      chick_type:          "Boiler".into(),
      loaded_box_weight:   "52.4".parse().unwrap(),
      empty_box_weight:    "2.4".parse().unwrap(),
      number_of_boxes:     Some(2),
      notes:               String::new(),
      loaded_weights_list: vec![],
      empty_weights_list:  vec![],
      order_id:            None,
    };
    assert_eq!(input.net_weight(), Decimal::from(50));
  }

  #[test]
  fn new_delivery_accepts_minimal_json() {
    let input: NewDelivery = serde_json::from_str(
      r#"{"customerName":"Asha","chickType":"Layer",
          "loadedBoxWeight":10,"emptyBoxWeight":1}"#,
    )
    .unwrap();
    assert_eq!(input.net_weight(), Decimal::from(9));
    assert!(input.customer_phone.is_none());
    assert!(input.loaded_weights_list.is_empty());
  }
}
