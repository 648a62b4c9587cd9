//! The freshness gate: only publish once the source has released the period
//! a run expects.

use crate::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  Publish,
  /// `latest` is the newest period found in the data, if any.
  Suppress { latest: Option<Period> },
}

impl Freshness {
  pub fn is_publish(self) -> bool { matches!(self, Self::Publish) }
}

/// `Publish` iff the newest normalized period equals `expected`.
///
/// Data that runs ahead of `expected` is suppressed as well; whether that
/// case should publish is an open product question.
pub fn gate(latest: Option<Period>, expected: Period) -> Freshness {
  match latest {
    Some(latest) if latest == expected => Freshness::Publish,
    latest => Freshness::Suppress { latest },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn p(s: &str) -> Period { s.parse().unwrap() }

  #[test]
  fn matching_period_publishes() {
    assert_eq!(gate(Some(p("2024-05-01")), p("2024-05")), Freshness::Publish);
  }

  #[test]
  fn older_period_suppresses() {
    assert_eq!(
      gate(Some(p("2024-04-01")), p("2024-05")),
      Freshness::Suppress { latest: Some(p("2024-04")) }
    );
  }

  #[test]
  fn newer_period_suppresses() {
    assert!(!gate(Some(p("2024-06-01")), p("2024-05")).is_publish());
  }

  #[test]
  fn empty_data_suppresses() {
    assert_eq!(gate(None, p("2024-05")), Freshness::Suppress { latest: None });
  }
}
