//! Handlers for `/deliveries` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/deliveries` | Most recent first |
//! | `POST`   | `/deliveries` | Lazily creates the ledger account |
//! | `DELETE` | `/deliveries` | Delete all |
//! | `PUT`    | `/deliveries/:id` | 404 if not found |
//! | `DELETE` | `/deliveries/:id` | 404 if not found |
//! | `PUT`    | `/deliveries/:id/price` | Posts/replaces the linked ledger entry |
//! | `DELETE` | `/deliveries/date/:date` | `YYYY-MM-DD` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use roost_core::{
  delivery::{Delivery, NewDelivery, PriceOutcome},
  store::DeliveryStore,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;

/// `GET /deliveries`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Delivery>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let deliveries = store.list_deliveries().await.map_err(ApiError::store)?;
  Ok(Json(deliveries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub customer_name:       Option<String>,
  #[serde(default)]
  pub customer_phone:      Option<String>,
  pub chick_type:          Option<String>,
  pub loaded_box_weight:   Option<Decimal>,
  pub empty_box_weight:    Option<Decimal>,
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

impl CreateBody {
  /// Required fields are checked here so a missing one surfaces as a 400
  /// rather than a body-deserialisation failure.
  fn into_input(self) -> Result<NewDelivery, ApiError> {
    fn required(field: &str) -> ApiError {
      ApiError::BadRequest(format!("{field} is required"))
    }
    Ok(NewDelivery {
      customer_name:       self.customer_name.ok_or_else(|| required("customerName"))?,
      customer_phone:      self.customer_phone,
      chick_type:          self.chick_type.ok_or_else(|| required("chickType"))?,
      loaded_box_weight:   self
        .loaded_box_weight
        .ok_or_else(|| required("loadedBoxWeight"))?,
      empty_box_weight:    self
        .empty_box_weight
        .ok_or_else(|| required("emptyBoxWeight"))?,
      number_of_boxes:     self.number_of_boxes,
      notes:               self.notes,
      loaded_weights_list: self.loaded_weights_list,
      empty_weights_list:  self.empty_weights_list,
      order_id:            self.order_id,
    })
  }
}

/// `POST /deliveries`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let input = body.into_input()?;
  if let Some(phone) = input.customer_phone.as_deref().filter(|p| !p.is_empty()) {
    store
      .get_or_create_account(phone, &input.customer_name)
      .await
      .map_err(ApiError::store)?;
  }
  let delivery = store.create_delivery(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(delivery)))
}

/// `PUT /deliveries/:id`
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(input): Json<NewDelivery>,
) -> Result<Json<Delivery>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let delivery = store
    .update_delivery(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("delivery {id} not found")))?;
  Ok(Json(delivery))
}

/// `DELETE /deliveries/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let removed = store.delete_delivery(id).await.map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!("delivery {id} not found")));
  }
  Ok(Json(json!({ "success": true })))
}

/// `DELETE /deliveries`
pub async fn delete_all<S>(
  State(store): State<Arc<S>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let deleted = store.delete_all_deliveries().await.map_err(ApiError::store)?;
  Ok(Json(json!({ "success": true, "deletedCount": deleted })))
}

/// `DELETE /deliveries/date/:date`
pub async fn delete_on_date<S>(
  State(store): State<Arc<S>>,
  Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
    .map_err(|_| ApiError::BadRequest(format!("invalid date: {date:?}")))?;
  let deleted = store
    .delete_deliveries_on(date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "success": true, "deletedCount": deleted })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBody {
  pub price_per_kg: Decimal,
}

/// `PUT /deliveries/:id/price`
pub async fn price_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<PriceBody>,
) -> Result<Json<Delivery>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match store
    .price_delivery(id, body.price_per_kg)
    .await
    .map_err(ApiError::store)?
  {
    PriceOutcome::Priced(delivery) => Ok(Json(delivery)),
    PriceOutcome::NotFound => {
      Err(ApiError::NotFound(format!("delivery {id} not found")))
    }
    PriceOutcome::NoCustomerPhone => Err(ApiError::BadRequest(
      "delivery has no customer phone".into(),
    )),
  }
}
