//! Core types and trait definitions for the registration pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! fetcher, blob store, warehouse and notifier are traits; concrete backends
//! live in `ecc-scraper` and `ecc-store-sqlite`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod collab;
pub mod country;
pub mod error;
pub mod freshness;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod record;
pub mod run;
pub mod warehouse;

pub use country::Country;
pub use error::{Error, ErrorKind, Result};
pub use period::Period;
pub use record::{Batch, Field, FuelType, RegistrationRecord, WriteMode};
