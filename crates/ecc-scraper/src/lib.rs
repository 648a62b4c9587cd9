//! Production collaborators for pipeline runs: the reqwest fetcher, the
//! filesystem bucket for raw payloads, and the Slack operations channel.
//!
//! The `ecc-scrape` binary wires these to an `ecc-store-sqlite` warehouse.

pub mod bucket;
pub mod config;
pub mod error;
pub mod http;
pub mod slack;

pub use bucket::FsBucket;
pub use config::ScraperConfig;
pub use error::{Error, Result};
pub use http::ReqwestFetcher;
pub use slack::{OpsChannel, SlackConfig, SlackNotifier};
