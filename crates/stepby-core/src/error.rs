//! Error types for `stepby-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("week day out of range (expected 0-6): {0}")]
  InvalidWeekDay(u8),

  #[error("a weekly habit needs at least one week day")]
  EmptyWeekDays,

  #[error("year out of range (expected 1900-2999): {0}")]
  InvalidYear(i32),

  #[error("invalid date: {0:?}")]
  InvalidDate(String),

  #[error("unknown timezone: {0:?}")]
  UnknownTimezone(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
