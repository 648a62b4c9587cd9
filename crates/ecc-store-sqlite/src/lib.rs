//! SQLite backend for the registration warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Registration tables are created on
//! first write; the leaderboard table is part of the fixed schema.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::LEADERBOARD_TABLE;
pub use store::SqliteWarehouse;
