//! Error types for `ecc-scraper`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Blob names are relative paths without `..` components.
  #[error("invalid blob name: {0:?}")]
  InvalidBlobName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
