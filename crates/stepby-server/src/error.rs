//! Error type for `stepby-server`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("redis did not answer within {0:?}")]
  Timeout(std::time::Duration),

  #[error("invalid reminder time {0:?} (expected HH:MM)")]
  InvalidReminderTime(String),

  #[error("push request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
