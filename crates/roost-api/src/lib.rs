//! JSON REST API for Roost.
//!
//! Exposes an axum [`Router`] backed by any
//! [`roost_core::store::DeliveryStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(roost_api::api_router(store.clone()))
//! ```

pub mod accounts;
pub mod backups;
pub mod deliveries;
pub mod error;
pub mod orders;
pub mod transactions;

use std::sync::Arc;

use axum::{
  Json,
  Router,
  routing::{delete, get, post, put},
};
use roost_core::store::DeliveryStore;
use serde_json::json;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router
/// regardless of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DeliveryStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Accounts
    .route(
      "/accounts",
      get(accounts::list::<S>).post(accounts::create::<S>),
    )
    .route("/accounts/hidden/list", get(accounts::hidden_list::<S>))
    .route("/accounts/{phone}", get(accounts::get_one::<S>))
    .route(
      "/accounts/{phone}/toggle-visibility",
      put(accounts::toggle_visibility::<S>),
    )
    // Ledger transactions
    .route(
      "/accounts/{phone}/transactions",
      get(transactions::list_for_account::<S>),
    )
    .route(
      "/accounts/{phone}/transactions/delivery",
      post(transactions::create_delivery_entry::<S>),
    )
    .route(
      "/accounts/{phone}/transactions/payment",
      post(transactions::create_payment::<S>),
    )
    .route(
      "/transactions/{id}",
      put(transactions::update_one::<S>).delete(transactions::delete_one::<S>),
    )
    // Deliveries
    .route(
      "/deliveries",
      get(deliveries::list::<S>)
        .post(deliveries::create::<S>)
        .delete(deliveries::delete_all::<S>),
    )
    .route(
      "/deliveries/{id}",
      put(deliveries::update_one::<S>).delete(deliveries::delete_one::<S>),
    )
    .route("/deliveries/{id}/price", put(deliveries::price_one::<S>))
    .route("/deliveries/date/{date}", delete(deliveries::delete_on_date::<S>))
    // Orders
    .route(
      "/orders",
      get(orders::list::<S>)
        .post(orders::create::<S>)
        .delete(orders::delete_all::<S>),
    )
    .route(
      "/orders/{id}",
      put(orders::update_one::<S>).delete(orders::delete_one::<S>),
    )
    // Backups
    .route("/backups", get(backups::list::<S>).post(backups::create::<S>))
    .route("/backups/{filename}/download", get(backups::download::<S>))
    .route("/backups/{filename}/restore", post(backups::restore_one::<S>))
    .route("/backups/{filename}", delete(backups::delete_one::<S>))
    .route("/restore", post(backups::restore_from_body::<S>))
    .route("/merge", post(backups::merge_from_body::<S>))
    // Liveness
    .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
    .with_state(store)
}
