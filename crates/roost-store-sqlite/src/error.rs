//! Error type for `roost-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("decimal parse error: {0}")]
  DecimalParse(String),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown discriminant: {0:?}")]
  UnknownDiscriminant(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
