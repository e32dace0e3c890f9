//! Handlers for `/orders` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/orders` | Most recent first |
//! | `POST`   | `/orders` | Starts `pending`; lazily creates the ledger account |
//! | `DELETE` | `/orders` | Delete all |
//! | `PUT`    | `/orders/:id` | Patch status/notes, 404 if not found |
//! | `DELETE` | `/orders/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roost_core::{
  order::{NewOrder, Order, OrderPatch},
  store::DeliveryStore,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;

/// `GET /orders`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Order>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let orders = store.list_orders().await.map_err(ApiError::store)?;
  Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub chick_type:     Option<String>,
  pub quantity:       Option<u32>,
  pub customer_name:  Option<String>,
  #[serde(default)]
  pub customer_phone: String,
  #[serde(default)]
  pub notes:          String,
}

impl CreateBody {
  /// Required fields are checked here so a missing one surfaces as a 400
  /// rather than a body-deserialisation failure.
  fn into_input(self) -> Result<NewOrder, ApiError> {
    fn required(field: &str) -> ApiError {
      ApiError::BadRequest(format!("{field} is required"))
    }
    Ok(NewOrder {
      chick_type:     self.chick_type.ok_or_else(|| required("chickType"))?,
      quantity:       self.quantity.ok_or_else(|| required("quantity"))?,
      customer_name:  self.customer_name.ok_or_else(|| required("customerName"))?,
      customer_phone: self.customer_phone,
      notes:          self.notes,
    })
  }
}

/// `POST /orders`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let input = body.into_input()?;
  if !input.customer_phone.is_empty() {
    store
      .get_or_create_account(&input.customer_phone, &input.customer_name)
      .await
      .map_err(ApiError::store)?;
  }
  let order = store.create_order(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(order)))
}

/// `PUT /orders/:id`
pub async fn update_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(patch): Json<OrderPatch>,
) -> Result<Json<Order>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let order = store
    .update_order(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
  Ok(Json(order))
}

/// `DELETE /orders/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let removed = store.delete_order(id).await.map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!("order {id} not found")));
  }
  Ok(Json(json!({ "success": true })))
}

/// `DELETE /orders`
pub async fn delete_all<S>(
  State(store): State<Arc<S>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let deleted = store.delete_all_orders().await.map_err(ApiError::store)?;
  Ok(Json(json!({ "success": true, "deletedCount": deleted })))
}
