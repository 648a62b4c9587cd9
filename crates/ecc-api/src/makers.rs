//! Manufacturer endpoints. Only countries whose tables split makes by fuel
//! type are served.

use axum::{
  Json,
  extract::{Query, State},
};
use ecc_core::warehouse::WarehouseReader;
use serde_json::Value;

use crate::{AppState, CountryQuery, columns::Columns, countries, error::ApiError};

/// How many makes `/top_makers2` breaks down.
const TOP_MAKES: usize = 5;

/// `GET /top_makers?country=<country>`: the pre-aggregated BEV leaderboard.
pub async fn top_makers<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  let country = countries::make_table(q.country.as_deref())?;
  let value = state
    .cache
    .get_or_load(format!("top_makers:{country}"), || async {
      let entries = state.warehouse.top_makers(country).await.map_err(ApiError::warehouse)?;
      let mut out = Columns::new(&["make", "BEV_sales", "BEV_percentage"]);
      for entry in entries {
        out.push("make", entry.make);
        out.push("BEV_sales", entry.bev_sales);
        out.push("BEV_percentage", entry.bev_percentage);
      }
      Ok(out.into_value())
    })
    .await?;
  Ok(Json(value))
}

/// `GET /top_makers2?country=<country>`: fuel-type split of the best-selling
/// makes of the latest month.
pub async fn top_makers2<W: WarehouseReader>(
  State(state): State<AppState<W>>,
  Query(q): Query<CountryQuery>,
) -> Result<Json<Value>, ApiError> {
  let table = countries::make_table(q.country.as_deref())?;
  let value = state
    .cache
    .get_or_load(format!("top_makers2:{table}"), || async {
      let shares = state
        .warehouse
        .top_make_fuel_share(table, TOP_MAKES)
        .await
        .map_err(ApiError::warehouse)?;
      let mut out = Columns::new(&["make", "fuelType", "market_share"]);
      for share in shares {
        out.push("make", share.make);
        out.push("fuelType", share.fuel_type.as_str());
        out.push("market_share", share.market_share);
      }
      Ok(out.into_value())
    })
    .await?;
  Ok(Json(value))
}
