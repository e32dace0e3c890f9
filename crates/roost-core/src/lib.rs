//! Domain types and the storage trait for the Roost delivery tracker.
//!
//! Everything HTTP- or database-shaped lives in the other crates; this
//! one holds only the ledger/delivery/order model and [`store::DeliveryStore`].

// Storage backends implement the trait with native `async fn`; keep the
// advisory lint about `Send` bounds on the returned futures quiet.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod backup;
pub mod delivery;
pub mod order;
pub mod store;
pub mod transaction;
