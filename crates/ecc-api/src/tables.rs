//! Fuel-type comparison tables.
//!
//! `GET /table` compares the latest twelve months with the twelve before
//! them; `GET /table2` compares the latest month with the same month a year
//! earlier. Both take `?country=`.

use axum::{
  Json,
  extract::{Query, State},
};
use ecc_core::warehouse::{ComparisonRow, ComparisonWindow, WarehouseReader};
use serde_json::Value;

use crate::{AppState, CountryQuery, columns::Columns, countries, error::ApiError};

pub async fn table<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  comparison(&state, q, "table", ComparisonWindow::TrailingYear).await
}

pub async fn table2<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  comparison(&state, q, "table2", ComparisonWindow::SameMonthLastYear).await
}

async fn comparison<W: WarehouseReader>(
  state: &AppState<W>,
  q: CountryQuery,
  endpoint: &str,
  window: ComparisonWindow,
) -> Result<Json<Value>, ApiError> {
  let table = countries::fuel_table(q.country.as_deref())?;
  let value = state
    .cache
    .get_or_load(format!("{endpoint}:{table}"), || async {
      let rows =
        state.warehouse.period_comparison(table, window).await.map_err(ApiError::warehouse)?;
      Ok(render(&rows))
    })
    .await?;
  Ok(Json(value))
}

/// Undefined ratios (a zero divisor) render as `0`.
fn render(rows: &[ComparisonRow]) -> Value {
  let mut out = Columns::new(&["fuelType", "total", "perc_change", "share"]);
  for row in rows {
    out.push("fuelType", row.fuel_type.as_str());
    out.push("total", row.total);
    out.push("perc_change", row.perc_change.unwrap_or(0.0));
    out.push("share", row.share.unwrap_or(0.0));
  }
  out.into_value()
}
