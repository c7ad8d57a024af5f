//! Key/value cache abstraction used to memoise year summaries.
//!
//! Values are opaque strings (serialised JSON). Backends have no expiry; a
//! cached summary stays valid until it is explicitly deleted.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

/// Namespace shared by every summary key.
pub const SUMMARY_NAMESPACE: &str = "stepby::summary";

/// The cache key for the summary of `user_id` in `year`.
pub fn summary_key(user_id: Uuid, year: i32) -> String {
  format!("{SUMMARY_NAMESPACE}::{user_id}::{year}")
}

/// A string get/set/delete store. Each call is an independent round-trip.
pub trait CacheStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── In-memory backend ───────────────────────────────────────────────────────

/// A process-local cache. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
  entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  pub fn contains_key(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(key)
  }
}

impl CacheStore for MemoryCache {
  type Error = Infallible;

  async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>, Infallible> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.get(key).cloned())
  }

  async fn set<'a>(&'a self, key: &'a str, value: String) -> Result<(), Infallible> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key.to_owned(), value);
    Ok(())
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<(), Infallible> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.remove(key);
    Ok(())
  }
}
