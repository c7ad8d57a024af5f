//! [`CacheStore`] backed by Redis.
//!
//! Each operation opens a multiplexed connection and is bounded by a timeout,
//! so a stalled Redis degrades into cache errors instead of stalled requests.

use std::{future::Future, time::Duration};

use redis::AsyncCommands as _;
use stepby_core::cache::CacheStore;

use crate::{Error, Result};

#[derive(Clone)]
pub struct RedisCache {
  client:  redis::Client,
  timeout: Duration,
}

impl RedisCache {
  pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

  /// Parse `url` (e.g. `redis://127.0.0.1/`). No connection is made yet.
  pub fn open(url: &str) -> Result<Self> {
    Ok(Self { client: redis::Client::open(url)?, timeout: Self::DEFAULT_TIMEOUT })
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(self.timeout, op)
      .await
      .map_err(|_| Error::Timeout(self.timeout))?
  }
}

impl CacheStore for RedisCache {
  type Error = Error;

  async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>> {
    self
      .bounded(async {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok::<_, Error>(value)
      })
      .await
  }

  async fn set<'a>(&'a self, key: &'a str, value: String) -> Result<()> {
    self
      .bounded(async {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok::<_, Error>(())
      })
      .await
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<()> {
    self
      .bounded(async {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _removed: i64 = conn.del(key).await?;
        Ok::<_, Error>(())
      })
      .await
  }
}
