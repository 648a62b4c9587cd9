//! Country allow-lists and the warehouse table behind each country.

use crate::error::ApiError;

/// Countries with fuel-type data.
pub const COUNTRIES: [&str; 46] = [
  "austria", "belgium", "bulgaria", "china", "croatia", "cyprus", "czechia", "denmark",
  "estonia", "finland", "france", "germany", "greece", "hungary", "india", "ireland", "italy",
  "japan", "latvia", "lithuania", "luxembourg", "malta", "netherlands", "norway", "poland",
  "portugal", "romania", "slovakia", "slovenia", "sweden", "uk", "mexico", "spain", "brazil",
  "thailand", "canada", "us", "switzerland", "iceland", "australia", "singapore", "turkey", "nz",
  "hk", "chile", "taiwan",
];

/// Countries whose tables break makes down by fuel type.
pub const MAKE_COUNTRIES: [&str; 15] = [
  "uk",
  "italy",
  "china",
  "netherlands",
  "japan",
  "czechia",
  "spain",
  "portugal",
  "india",
  "germany",
  "sweden",
  "finland",
  "singapore",
  "nz",
  "hk",
];

fn find(list: &[&'static str], country: Option<&str>) -> Option<&'static str> {
  let country = country?;
  list.iter().copied().find(|c| *c == country)
}

/// The fuel-type table of `country`. Switzerland splits its data and keeps
/// fuel types in a table of their own.
pub fn fuel_table(country: Option<&str>) -> Result<&'static str, ApiError> {
  match find(&COUNTRIES, country) {
    Some("switzerland") => Ok("switzerland_fueltype"),
    Some(c) => Ok(c),
    None => Err(ApiError::UnsupportedCountry),
  }
}

/// The make × fuel-type table of `country`; also its leaderboard key.
pub fn make_table(country: Option<&str>) -> Result<&'static str, ApiError> {
  find(&MAKE_COUNTRIES, country).ok_or(ApiError::UnsupportedMakeCountry)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn switzerland_reads_its_fuel_type_table() {
    assert_eq!(fuel_table(Some("switzerland")).unwrap(), "switzerland_fueltype");
    assert_eq!(fuel_table(Some("sweden")).unwrap(), "sweden");
  }

  #[test]
  fn lookups_are_exact() {
    assert!(fuel_table(Some("Sweden")).is_err());
    assert!(fuel_table(None).is_err());
    assert!(matches!(make_table(Some("switzerland")), Err(ApiError::UnsupportedMakeCountry)));
  }

  #[test]
  fn make_countries_are_countries() {
    assert!(MAKE_COUNTRIES.iter().all(|c| COUNTRIES.contains(c)));
  }
}
