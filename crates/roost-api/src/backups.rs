//! Handlers for backup, restore, and merge endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/backups` | Metadata only, newest first |
//! | `POST`   | `/backups` | Creates a manual snapshot |
//! | `GET`    | `/backups/:filename/download` | Full JSON, attachment |
//! | `POST`   | `/backups/:filename/restore` | Replace-all |
//! | `DELETE` | `/backups/:filename` | |
//! | `POST`   | `/restore` | Body = snapshot JSON, replace-all |
//! | `POST`   | `/merge` | Body = snapshot JSON, additive |
//!
//! Uploaded snapshot bodies are validated before anything is touched: a
//! payload without a `deliveries` array is rejected with 400.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use roost_core::{
  backup::{BackupKind, MergeReport, RestoreReport, SnapshotMeta, SnapshotPayload},
  store::DeliveryStore,
};
use serde_json::json;

use crate::error::ApiError;

/// `GET /backups`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<SnapshotMeta>>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let backups = store.list_backups().await.map_err(ApiError::store)?;
  Ok(Json(backups))
}

/// `POST /backups`
pub async fn create<S>(
  State(store): State<Arc<S>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let meta = store
    .create_backup(BackupKind::Manual)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(meta)))
}

/// `GET /backups/:filename/download`
pub async fn download<S>(
  State(store): State<Arc<S>>,
  Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let payload = store
    .get_backup(&filename)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("backup {filename} not found")))?;
  Ok((
    [(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}\""),
    )],
    Json(payload),
  ))
}

/// `POST /backups/:filename/restore`
pub async fn restore_one<S>(
  State(store): State<Arc<S>>,
  Path(filename): Path<String>,
) -> Result<Json<RestoreReport>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = store
    .restore_backup(&filename)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("backup {filename} not found")))?;
  Ok(Json(report))
}

/// `DELETE /backups/:filename`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let removed = store.delete_backup(&filename).await.map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!("backup {filename} not found")));
  }
  Ok(Json(json!({ "success": true })))
}

/// Parse an uploaded snapshot body, rejecting anything without a
/// `deliveries` array before the store is touched.
fn parse_snapshot(body: serde_json::Value) -> Result<SnapshotPayload, ApiError> {
  if !body.get("deliveries").is_some_and(serde_json::Value::is_array) {
    return Err(ApiError::BadRequest(
      "invalid backup: missing deliveries array".into(),
    ));
  }
  serde_json::from_value(body)
    .map_err(|e| ApiError::BadRequest(format!("invalid backup: {e}")))
}

/// `POST /restore`
pub async fn restore_from_body<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<serde_json::Value>,
) -> Result<Json<RestoreReport>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let payload = parse_snapshot(body)?;
  let report = store
    .restore_from_data(payload)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(report))
}

/// `POST /merge`
pub async fn merge_from_body<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<serde_json::Value>,
) -> Result<Json<MergeReport>, ApiError>
where
  S: DeliveryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let payload = parse_snapshot(body)?;
  let report = store
    .merge_from_data(payload)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(report))
}
