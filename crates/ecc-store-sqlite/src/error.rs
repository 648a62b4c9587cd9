//! Error type for `ecc-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ecc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Table names are interpolated into SQL, so only plain identifiers pass.
  #[error("invalid table name: {0:?}")]
  InvalidTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
