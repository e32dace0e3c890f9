//! Order — a customer's advance request for chicks, fulfilled later by a
//! delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id:             i64,
  pub chick_type:     String,
  pub quantity:       u32,
  pub customer_name:  String,
  pub customer_phone: String,
  #[serde(default)]
  pub notes:          String,
  pub status:         OrderStatus,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input for creating an order. New orders always start out `pending`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  pub chick_type:     String,
  pub quantity:       u32,
  pub customer_name:  String,
  pub customer_phone: String,
  #[serde(default)]
  pub notes:          String,
}

/// Shallow-merge update for an order; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
  pub status: Option<OrderStatus>,
  pub notes:  Option<String>,
}
