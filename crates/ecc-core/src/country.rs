//! The closed set of countries with a scraping pipeline.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Country {
  Finland,
  Sweden,
  Switzerland,
}

impl Country {
  pub const ALL: [Country; 3] = [Self::Finland, Self::Sweden, Self::Switzerland];

  /// ISO 3166-1 alpha-2 code; also the prefix of every notification line.
  pub fn code(self) -> &'static str {
    match self {
      Self::Finland => "FI",
      Self::Sweden => "SE",
      Self::Switzerland => "CH",
    }
  }

  /// Lowercase English name, as used by the API allow-list.
  pub fn slug(self) -> &'static str {
    match self {
      Self::Finland => "finland",
      Self::Sweden => "sweden",
      Self::Switzerland => "switzerland",
    }
  }
}

impl fmt::Display for Country {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.slug()) }
}

/// Case-insensitive; accepts either the code or the slug.
impl FromStr for Country {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let needle = s.trim();
    Self::ALL
      .into_iter()
      .find(|c| c.code().eq_ignore_ascii_case(needle) || c.slug().eq_ignore_ascii_case(needle))
      .ok_or_else(|| Error::UnknownCountry(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_by_code_or_slug() {
    assert_eq!("ch".parse::<Country>().unwrap(), Country::Switzerland);
    assert_eq!("Sweden".parse::<Country>().unwrap(), Country::Sweden);
    assert_eq!(" FI ".parse::<Country>().unwrap(), Country::Finland);
    assert!(matches!("norway".parse::<Country>(), Err(Error::UnknownCountry(_))));
  }
}
