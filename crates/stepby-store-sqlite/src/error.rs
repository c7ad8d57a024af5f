//! Error type for `stepby-store-sqlite`.

use rusqlite::ffi;
use stepby_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] stepby_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  /// A UNIQUE or PRIMARY KEY constraint rejected the write.
  #[error("conflicting write: {0}")]
  Conflict(String),

  /// A FOREIGN KEY constraint rejected the write.
  #[error("referenced row does not exist: {0}")]
  MissingReference(String),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("undecodable column value: {0}")]
  Decode(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      ref message,
    )) = e
    {
      let detail = message.clone().unwrap_or_else(|| failure.to_string());
      match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
          return Error::Conflict(detail);
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
          return Error::MissingReference(detail);
        }
        _ => {}
      }
    }
    Error::Database(e)
  }
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Error::Conflict(_)) }

  fn is_missing_reference(&self) -> bool {
    matches!(self, Error::MissingReference(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
