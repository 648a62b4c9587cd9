//! Time-series endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/historicals?country=` | date × fuel type pivot, zero-filled, plus `lastUpdate` |
//! | `GET`  | `/scurve?country=` | BEV vs total per month |
//! | `GET`  | `/market_share?country=&fuel_type=&makes=A,B` | a make group within one fuel type |

use std::collections::{BTreeSet, HashMap};

use axum::{
  Json,
  extract::{Query, State},
};
use ecc_core::{
  FuelType, Period,
  warehouse::{FuelTypeTotal, WarehouseReader},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppState, CountryQuery, columns::Columns, countries, error::ApiError};

fn since(year: i32) -> Option<Period> { Period::new(year, 1).ok() }

// ─── Historicals ─────────────────────────────────────────────────────────────

/// `GET /historicals?country=<country>`
pub async fn historicals<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  let table = countries::fuel_table(q.country.as_deref())?;
  let value = state
    .cache
    .get_or_load(format!("historicals:{table}"), || async {
      let series =
        state.warehouse.fuel_type_series(table, since(2018)).await.map_err(ApiError::warehouse)?;
      Ok(pivot(&series))
    })
    .await?;
  Ok(Json(value))
}

pub fn pivot(series: &[FuelTypeTotal]) -> Value {
  let dates: BTreeSet<Period> = series.iter().map(|t| t.date).collect();
  let fuels: BTreeSet<FuelType> = series.iter().map(|t| t.fuel_type).collect();
  let cells: HashMap<(Period, FuelType), f64> =
    series.iter().map(|t| ((t.date, t.fuel_type), t.registrations)).collect();

  let mut names = vec!["date"];
  names.extend(fuels.iter().map(|f| f.as_str()));
  let mut out = Columns::new(&names);

  for date in &dates {
    out.push("date", date.to_date_string());
    for fuel in &fuels {
      out.push(fuel.as_str(), cells.get(&(*date, *fuel)).copied().unwrap_or(0.0));
    }
  }
  out.set("lastUpdate", dates.last().map(|d| d.to_date_string()));
  out.into_value()
}

// ─── S-curve ─────────────────────────────────────────────────────────────────

/// `GET /scurve?country=<country>`
pub async fn scurve<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  let table = countries::fuel_table(q.country.as_deref())?;
  let value = state
    .cache
    .get_or_load(format!("scurve:{table}"), || async {
      let curve =
        state.warehouse.adoption_curve(table, since(2018)).await.map_err(ApiError::warehouse)?;
      let mut out = Columns::new(&["date", "BEV", "Total"]);
      for point in curve {
        out.push("date", point.date.to_date_string());
        out.push("BEV", point.bev);
        out.push("Total", point.total);
      }
      Ok(out.into_value())
    })
    .await?;
  Ok(Json(value))
}

// ─── Market share ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarketShareQuery {
  pub country:   Option<String>,
  pub fuel_type: Option<String>,
  /// Comma-separated make names.
  pub makes:     Option<String>,
}

/// `GET /market_share?country=<country>&fuel_type=<token>&makes=<A,B,...>`
pub async fn market_share<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<MarketShareQuery>,
) -> Result<Json<Value>, ApiError> {
  let table = countries::fuel_table(q.country.as_deref())?;
  let fuel_type: FuelType = q
    .fuel_type
    .as_deref()
    .unwrap_or("BEV")
    .parse()
    .map_err(|e: ecc_core::Error| ApiError::BadRequest(e.to_string()))?;

  let mut makes: Vec<String> = q
    .makes
    .as_deref()
    .unwrap_or_default()
    .split(',')
    .map(str::trim)
    .filter(|m| !m.is_empty())
    .map(str::to_owned)
    .collect();
  if makes.is_empty() {
    return Err(ApiError::BadRequest("at least one make is required".into()));
  }
  makes.sort();
  makes.dedup();

  let key = format!("market_share:{table}:{fuel_type}:{}", makes.join(","));
  let value = state
    .cache
    .get_or_load(key, || async {
      let points = state
        .warehouse
        .market_share(table, fuel_type, &makes, since(2019))
        .await
        .map_err(ApiError::warehouse)?;
      let mut out = Columns::new(&["date", "partial", "total"]);
      for point in points {
        out.push("date", point.date.to_date_string());
        out.push("partial", point.partial);
        out.push("total", point.total);
      }
      Ok(out.into_value())
    })
    .await?;
  Ok(Json(value))
}
