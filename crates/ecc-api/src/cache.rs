//! A TTL cache for rendered query results.
//!
//! Entries are keyed by endpoint and query parameters and expire only by
//! age. Every load sweeps out expired entries, so keys that are never asked
//! for again do not pile up.

use std::{
  future::Future,
  time::{Duration, Instant},
};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

pub struct ResponseCache {
  ttl:     Duration,
  entries: DashMap<String, (Instant, Value)>,
}

impl ResponseCache {
  pub fn new(ttl: Duration) -> Self { Self { ttl, entries: DashMap::new() } }

  /// The cached value for `key`, or the result of `load` (cached on success).
  pub async fn get_or_load<F, Fut>(&self, key: String, load: F) -> Result<Value, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
  {
    let hit = self
      .entries
      .get(&key)
      .filter(|entry| entry.0.elapsed() < self.ttl)
      .map(|entry| entry.1.clone());
    if let Some(value) = hit {
      debug!(%key, "cache hit");
      return Ok(value);
    }

    let value = load().await?;
    self.entries.retain(|_, (at, _)| at.elapsed() < self.ttl);
    self.entries.insert(key, (Instant::now(), value.clone()));
    Ok(value)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
