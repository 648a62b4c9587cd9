//! Reporting periods.
//!
//! Every registration belongs to a calendar month. A [`Period`] is stored as
//! the first day of that month, so the day-of-month invariant cannot be broken
//! once a value exists.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
  pub fn new(year: i32, month: u32) -> Result<Self> {
    NaiveDate::from_ymd_opt(year, month, 1)
      .map(Self)
      .ok_or_else(|| Error::InvalidPeriod(format!("{year}-{month}")))
  }

  /// The month containing `date`.
  pub fn containing(date: NaiveDate) -> Self {
    Self(date - chrono::Days::new(u64::from(date.day0())))
  }

  /// The month immediately before the one containing `today`: the period a
  /// scheduled run expects to find as the newest published data point.
  pub fn preceding(today: NaiveDate) -> Self { Self::containing(today).previous() }

  pub fn previous(self) -> Self { Self(self.0 - Months::new(1)) }

  pub fn next(self) -> Self { Self(self.0 + Months::new(1)) }

  pub fn year(self) -> i32 { self.0.year() }

  pub fn month(self) -> u32 { self.0.month() }

  pub fn first_day(self) -> NaiveDate { self.0 }

  /// `YYYY-MM-01`, the warehouse representation.
  pub fn to_date_string(self) -> String { self.0.format("%Y-%m-%d").to_string() }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year(), self.month())
  }
}

/// Accepts `YYYY-MM` and `YYYY-MM-01`.
impl FromStr for Period {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidPeriod(s.to_owned());
    let mut parts = s.trim().split('-');
    let year: i32 = parts
      .next()
      .and_then(|p| p.parse().ok())
      .ok_or_else(invalid)?;
    let month: u32 = parts
      .next()
      .and_then(|p| p.parse().ok())
      .ok_or_else(invalid)?;
    match parts.next() {
      None => {}
      Some(day) if day.parse::<u32>().ok() == Some(1) => {}
      Some(_) => return Err(invalid()),
    }
    if parts.next().is_some() {
      return Err(invalid());
    }
    Self::new(year, month).map_err(|_| invalid())
  }
}

impl Serialize for Period {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_date_string())
  }
}

impl<'de> Deserialize<'de> for Period {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}
