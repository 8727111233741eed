//! SQLite backend for the GWFVis visualization database.
//!
//! A store is a single SQLite file. Writes build a fresh file next to the
//! target and rename it into place; reads rebuild an
//! [`Options`](gwfvis_core::options::Options) bundle. All database access
//! goes through [`tokio_rusqlite`] so it runs off the async runtime.

mod encode;
mod store;

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
