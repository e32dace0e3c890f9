//! Handlers for ledger transaction endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/accounts/:phone/transactions` | Effective-date descending |
//! | `POST`   | `/accounts/:phone/transactions/delivery` | Amount computed server-side |
//! | `POST`   | `/accounts/:phone/transactions/payment` | |
//! | `PUT`    | `/transactions/:id` | Shallow-merge patch, 404 if not found |
//! | `DELETE` | `/transactions/:id` | 404 if not found |
//!
//! Dates are accepted as RFC 3339 or bare `YYYY-MM-DD` (midnight UTC).
//! Required fields are validated here so a missing `kgs` or `date`
//! surfaces as 400 rather than a deserialisation failure.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use roost_core::{
  store::DeliveryStore,
  transaction::{
    NewDeliveryEntry, NewPayment, Transaction, TransactionPatch,
    parse_effective_date,
  },
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;

fn parse_date(s: &str) -> Result<DateTime<Utc>, ApiError> {
  parse_effective_date(s)
    .ok_or_else(|| ApiError::BadRequest(format!("invalid date: {s:?}")))
}

/// `GET /accounts/:phone/transactions`
pub async fn list_for_account<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let txns = store.transactions(&phone).await.map_err(ApiError::store)?;
  Ok(Json(txns))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntryBody {
  pub customer_name: String,
  pub date:          Option<String>,
  pub kgs:           Option<Decimal>,
  pub price_per_kg:  Option<Decimal>,
  #[serde(default)]
  pub notes:         String,
}

/// `POST /accounts/:phone/transactions/delivery`
pub async fn create_delivery_entry<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Json(body): Json<DeliveryEntryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let date = body
    .date
    .as_deref()
    .ok_or_else(|| ApiError::BadRequest("date is required".into()))?;
  let kgs = body
    .kgs
    .ok_or_else(|| ApiError::BadRequest("kgs is required".into()))?;
  let price_per_kg = body
    .price_per_kg
    .ok_or_else(|| ApiError::BadRequest("pricePerKg is required".into()))?;

  let txn = store
    .add_delivery_entry(NewDeliveryEntry {
      customer_phone: phone,
      customer_name: body.customer_name,
      date: parse_date(date)?,
      kgs,
      price_per_kg,
      notes: body.notes,
      delivery_id: None,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(txn)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
  pub customer_name: String,
  pub date:          Option<String>,
  pub amount:        Option<Decimal>,
  #[serde(default)]
  pub notes:         String,
}

/// `POST /accounts/:phone/transactions/payment`
pub async fn create_payment<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Json(body): Json<PaymentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let date = body
    .date
    .as_deref()
    .ok_or_else(|| ApiError::BadRequest("date is required".into()))?;
  let amount = body
    .amount
    .ok_or_else(|| ApiError::BadRequest("amount is required".into()))?;

  let txn = store
    .add_payment(NewPayment {
      customer_phone: phone,
      customer_name: body.customer_name,
      date: parse_date(date)?,
      amount,
      notes: body.notes,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(txn)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
  pub customer_name: Option<String>,
  pub date:          Option<String>,
  pub kgs:           Option<Decimal>,
  pub price_per_kg:  Option<Decimal>,
  pub amount:        Option<Decimal>,
  pub notes:         Option<String>,
}

/// `PUT /transactions/:id`
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<PatchBody>,
) -> Result<Json<Transaction>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let date = body.date.as_deref().map(parse_date).transpose()?;
  let patch = TransactionPatch {
    customer_name: body.customer_name,
    date,
    kgs: body.kgs,
    price_per_kg: body.price_per_kg,
    amount: body.amount,
    notes: body.notes,
  };

  let txn = store
    .update_transaction(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("transaction {id} not found")))?;
  Ok(Json(txn))
}

/// `DELETE /transactions/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let removed = store.delete_transaction(id).await.map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!("transaction {id} not found")));
  }
  Ok(Json(json!({ "success": true })))
}
