//! Handlers for `/accounts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/accounts` | Optional `?includeHidden=true` |
//! | `POST` | `/accounts` | Body: `{"customerPhone":..,"customerName":..}`, get-or-create |
//! | `GET`  | `/accounts/hidden/list` | Hidden accounts only |
//! | `GET`  | `/accounts/:phone` | 404 if not found |
//! | `PUT`  | `/accounts/:phone/toggle-visibility` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use roost_core::{account::Account, store::DeliveryStore};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  #[serde(default)]
  pub include_hidden: bool,
}

/// `GET /accounts[?includeHidden=bool]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Account>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let accounts = store
    .list_accounts(params.include_hidden)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(accounts))
}

/// `GET /accounts/hidden/list`
pub async fn hidden_list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Account>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let accounts = store.hidden_accounts().await.map_err(ApiError::store)?;
  Ok(Json(accounts))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub customer_phone: Option<String>,
  pub customer_name:  Option<String>,
}

/// `POST /accounts`, get-or-create by phone.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<Json<Account>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let phone = body
    .customer_phone
    .filter(|p| !p.is_empty())
    .ok_or_else(|| ApiError::BadRequest("customerPhone is required".into()))?;
  let name = body
    .customer_name
    .ok_or_else(|| ApiError::BadRequest("customerName is required".into()))?;
  let account = store
    .get_or_create_account(&phone, &name)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(account))
}

/// `GET /accounts/:phone`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<Account>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = store
    .get_account(&phone)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("account {phone} not found")))?;
  Ok(Json(account))
}

/// `PUT /accounts/:phone/toggle-visibility`
pub async fn toggle_visibility<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<Account>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = store
    .toggle_account_visibility(&phone)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("account {phone} not found")))?;
  Ok(Json(account))
}
