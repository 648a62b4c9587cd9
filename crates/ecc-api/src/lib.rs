//! Read-only JSON API over the registration warehouse.
//!
//! Every endpoint takes a `country` query parameter checked against an
//! allow-list, answers with a column-oriented object (`{column: [values]}`),
//! and caches its rendered body per endpoint and parameters for the
//! configured TTL.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = ecc_api::api_router(Arc::new(warehouse), Duration::from_secs(3600));
//! ```

pub mod cache;
pub mod columns;
pub mod countries;
pub mod error;
pub mod makers;
pub mod series;
pub mod tables;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Json, Router, routing::get};
use ecc_core::warehouse::WarehouseReader;
use serde::Deserialize;
use serde_json::{Value, json};

pub use cache::ResponseCache;
pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Server configuration, read from `config.toml` and `ECC__*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_warehouse_path")]
  pub warehouse_path: PathBuf,
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }
fn default_warehouse_path() -> PathBuf { PathBuf::from("~/.local/share/ecc/warehouse.db") }
fn default_cache_ttl_secs() -> u64 { 3600 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<W> {
  pub warehouse: Arc<W>,
  pub cache:     Arc<ResponseCache>,
}

// Derived `Clone` would require `W: Clone`.
impl<W> Clone for AppState<W> {
  fn clone(&self) -> Self {
    Self { warehouse: Arc::clone(&self.warehouse), cache: Arc::clone(&self.cache) }
  }
}

/// The `?country=` parameter shared by most endpoints.
#[derive(Debug, Deserialize)]
pub struct CountryQuery {
  pub country: Option<String>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `warehouse`, caching responses for `cache_ttl`.
pub fn api_router<W>(warehouse: Arc<W>, cache_ttl: Duration) -> Router<()>
where
  W: WarehouseReader + 'static,
{
  let state = AppState { warehouse, cache: Arc::new(ResponseCache::new(cache_ttl)) };

  Router::new()
    .route("/health", get(health))
    // Series
    .route("/historicals", get(series::historicals::<W>))
    .route("/scurve", get(series::scurve::<W>))
    .route("/market_share", get(series::market_share::<W>))
    // Comparison tables
    .route("/table", get(tables::table::<W>))
    .route("/table2", get(tables::table2::<W>))
    // Makers
    .route("/top_makers", get(makers::top_makers::<W>))
    .route("/top_makers2", get(makers::top_makers2::<W>))
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use ecc_core::{
    Field, FuelType, Period, RegistrationRecord, warehouse::Warehouse,
  };
  use ecc_store_sqlite::SqliteWarehouse;
  use tower::ServiceExt as _;

  use super::*;

  const KEY: &[Field] = &[Field::Date, Field::FuelType, Field::Make];

  fn rec(date: &str, fuel: FuelType, make: &str, n: f64) -> RegistrationRecord {
    RegistrationRecord::new(date.parse::<Period>().unwrap(), fuel, make, n)
  }

  async fn warehouse() -> Arc<SqliteWarehouse> {
    let w = SqliteWarehouse::open_in_memory().await.unwrap();
    w.append(
      "sweden",
      &[
        rec("2024-04", FuelType::Petrol, "Volvo", 30.0),
        rec("2024-05", FuelType::Petrol, "Volvo", 28.0),
        rec("2024-05", FuelType::Bev, "Tesla", 12.0),
      ],
      KEY,
    )
    .await
    .unwrap();
    Arc::new(w)
  }

  async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  fn app(w: Arc<SqliteWarehouse>) -> Router { api_router(w, Duration::from_secs(3600)) }

  #[tokio::test]
  async fn health_is_ok() {
    let (status, body) = get_json(&app(warehouse().await), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
  }

  #[tokio::test]
  async fn unknown_or_missing_country_is_400() {
    let app = app(warehouse().await);
    for uri in ["/historicals?country=atlantis", "/historicals", "/table2?country=Sweden"] {
      let (status, body) = get_json(&app, uri).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(body, json!({ "error": "data not available for the specified country" }));
    }
  }

  #[tokio::test]
  async fn make_endpoints_reject_fuel_only_countries() {
    let app = app(warehouse().await);
    for uri in ["/top_makers?country=switzerland", "/top_makers2?country=norway"] {
      let (status, body) = get_json(&app, uri).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(body, json!({ "error": "make data not available for the specified country" }));
    }
  }

  #[tokio::test]
  async fn historicals_pivots_by_fuel_type() {
    let (status, body) = get_json(&app(warehouse().await), "/historicals?country=sweden").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!({
        "date": ["2024-04-01", "2024-05-01"],
        "petrol": [30.0, 28.0],
        "BEV": [0.0, 12.0],
        "lastUpdate": "2024-05-01",
      })
    );
  }

  #[tokio::test]
  async fn missing_table_answers_empty_columns() {
    let (status, body) = get_json(&app(warehouse().await), "/scurve?country=norway").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "date": [], "BEV": [], "Total": [] }));
  }

  #[tokio::test]
  async fn responses_are_cached_until_the_ttl_expires() {
    let w = warehouse().await;
    let cached = api_router(Arc::clone(&w), Duration::from_secs(3600));
    let fresh = api_router(Arc::clone(&w), Duration::ZERO);

    let (_, before) = get_json(&cached, "/scurve?country=sweden").await;
    get_json(&fresh, "/scurve?country=sweden").await;
    w.append("sweden", &[rec("2024-06", FuelType::Bev, "Tesla", 5.0)], KEY).await.unwrap();

    let (_, after) = get_json(&cached, "/scurve?country=sweden").await;
    assert_eq!(after, before);

    // The curve only has months with BEV registrations.
    assert_eq!(before["date"], json!(["2024-05-01"]));
    let (_, after) = get_json(&fresh, "/scurve?country=sweden").await;
    assert_eq!(after["date"], json!(["2024-05-01", "2024-06-01"]));
  }

  #[tokio::test]
  async fn comparison_table_renders_columns() {
    let (status, body) = get_json(&app(warehouse().await), "/table2?country=sweden").await;
    assert_eq!(status, StatusCode::OK);
    // Only one month of history: nothing to compare against.
    assert_eq!(body, json!({ "fuelType": [], "total": [], "perc_change": [], "share": [] }));
  }

  #[tokio::test]
  async fn market_share_validates_its_parameters() {
    let app = app(warehouse().await);

    let (status, _) = get_json(&app, "/market_share?country=sweden&fuel_type=bev&makes=Tesla").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/market_share?country=sweden&fuel_type=BEV&makes=,").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
      get_json(&app, "/market_share?country=sweden&fuel_type=BEV&makes=Tesla,%20Polestar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "date": ["2024-05-01"], "partial": [12.0], "total": [12.0] }));
  }

  #[tokio::test]
  async fn top_makers_reads_the_leaderboard() {
    let w = warehouse().await;
    w.refresh_leaderboard("sweden", "sweden").await.unwrap();

    let (status, body) = get_json(&app(w), "/top_makers?country=sweden").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!({ "make": ["Tesla"], "BEV_sales": [12.0], "BEV_percentage": [100.0] })
    );
  }

  #[tokio::test]
  async fn top_makers2_splits_makes_by_fuel_type() {
    let (status, body) = get_json(&app(warehouse().await), "/top_makers2?country=sweden").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["make"].as_array().unwrap().len(), 2);
    assert_eq!(body["market_share"][0], json!(100.0));
  }
}
