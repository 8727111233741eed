//! Error type for `gwfvis-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Schema violations, referential-integrity failures, unmatched tuples.
  #[error(transparent)]
  Core(#[from] gwfvis_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store not found: {}", .0.display())]
  StoreNotFound(PathBuf),

  #[error("{} is not a visualization database: {reason}", .path.display())]
  InvalidStore { path: PathBuf, reason: String },
}

impl Error {
  /// Recover a typed error raised inside a connection closure.
  pub(crate) fn from_call(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<gwfvis_core::Error>() {
        Ok(core) => Self::Core(*core),
        Err(inner) => Self::Database(tokio_rusqlite::Error::Other(inner)),
      },
      err => Self::Database(err),
    }
  }

  /// Borrow the core error, if this is one.
  pub fn as_core(&self) -> Option<&gwfvis_core::Error> {
    match self {
      Self::Core(err) => Some(err),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
