//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("data not available for the specified country")]
  UnsupportedCountry,

  #[error("make data not available for the specified country")]
  UnsupportedMakeCountry,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("warehouse error: {0}")]
  Warehouse(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn warehouse<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Warehouse(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::UnsupportedCountry
      | ApiError::UnsupportedMakeCountry
      | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Warehouse(e) => {
        tracing::error!(error = %e, "warehouse query failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
