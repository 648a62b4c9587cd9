//! Error types for `ecc-core`.

use thiserror::Error;

use crate::Country;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid period: {0:?}")]
  InvalidPeriod(String),

  #[error("unknown country: {0:?}")]
  UnknownCountry(String),

  #[error("unknown fuel type: {0:?}")]
  UnknownFuelType(String),

  /// The upstream answered with a non-success status.
  #[error("request to {url} failed with HTTP {status}")]
  Fetch { url: String, status: u16 },

  /// The request never produced a response (DNS, TLS, timeout, ...).
  #[error("request to {url} failed: {reason}")]
  Transport { url: String, reason: String },

  /// A structural marker the parser navigates by is missing.
  #[error("structural anchor {anchor:?} not found")]
  AnchorNotFound { anchor: String },

  #[error("parse error: {0}")]
  Parse(String),

  #[error("unmapped {country} fuel type {label:?}")]
  UnmappedFuelType { country: Country, label: String },

  #[error("warehouse error: {0}")]
  Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// The pipeline stage an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Input,
  Fetch,
  Parse,
  Mapping,
  Sink,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidPeriod(_) | Self::UnknownCountry(_) => ErrorKind::Input,
      Self::Fetch { .. } | Self::Transport { .. } => ErrorKind::Fetch,
      Self::AnchorNotFound { .. }
      | Self::Parse(_)
      | Self::Serialization(_)
      | Self::UnknownFuelType(_) => ErrorKind::Parse,
      Self::UnmappedFuelType { .. } => ErrorKind::Mapping,
      Self::Sink(_) => ErrorKind::Sink,
    }
  }

  pub fn parse(e: impl std::fmt::Display) -> Self { Self::Parse(e.to_string()) }

  pub fn anchor(anchor: impl Into<String>) -> Self {
    Self::AnchorNotFound { anchor: anchor.into() }
  }

  pub fn sink<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Sink(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
