//! Summary memoisation on top of any [`CacheStore`].
//!
//! The cache is an accelerator only. A failed read is a miss, a failed write
//! is dropped, and a failed delete marks the key as *bypassed*: until a later
//! delete of that key succeeds, reads skip the cache and nothing is written
//! back, so a stale entry can never be served.
//!
//! Writes run in the background. Every invalidation bumps a per-key
//! generation, and a write only lands if the generation it was issued under
//! is still current. Writes and deletes of the same key are serialised by a
//! lock owned by that key; backend I/O for one key never waits on another.
//!
//! Key state lives only while something holds it (a pending write, an
//! in-flight invalidation) or while the key is bypassed, so reads for keys
//! nobody writes leave nothing behind.
//!
//! The generation guard is local to this process. Several servers sharing
//! one Redis can still race: a slow write from one instance may land after
//! another instance's invalidation.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use stepby_core::{
  cache::{CacheStore, summary_key},
  summary::DaySummary,
};
use uuid::Uuid;

type KeyMap = Arc<Mutex<HashMap<String, KeyState>>>;

#[derive(Debug, Default)]
struct KeyState {
  generation: u64,
  bypassed:   bool,
  /// Outstanding [`Hold`]s on this key.
  holders:    usize,
  /// Serialises backend writes and deletes of this key.
  io:         Arc<tokio::sync::Mutex<()>>,
}

fn lock(keys: &KeyMap) -> std::sync::MutexGuard<'_, HashMap<String, KeyState>> {
  keys.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a key's state alive. Dropping the last hold of a key that is not
/// bypassed forgets the key.
#[derive(Debug)]
struct Hold {
  keys: KeyMap,
  key:  String,
}

impl Hold {
  fn acquire(keys: &KeyMap, key: &str) -> Self {
    lock(keys).entry(key.to_owned()).or_default().holders += 1;
    Self { keys: Arc::clone(keys), key: key.to_owned() }
  }

  fn with_state<R>(&self, f: impl FnOnce(&mut KeyState) -> R) -> Option<R> {
    lock(&self.keys).get_mut(&self.key).map(f)
  }
}

impl Drop for Hold {
  fn drop(&mut self) {
    let mut keys = lock(&self.keys);
    if let Some(state) = keys.get_mut(&self.key) {
      state.holders = state.holders.saturating_sub(1);
      if state.holders == 0 && !state.bypassed {
        keys.remove(&self.key);
      }
    }
  }
}

/// Result of [`SummaryCache::lookup`].
#[derive(Debug)]
pub enum Lookup {
  Hit(Vec<DaySummary>),
  /// Not cached; compute the summary and hand it back with the ticket.
  Miss(PutTicket),
  /// The key could not be invalidated earlier. Compute fresh, store nothing.
  Bypassed,
}

/// Permission to store a freshly computed summary.
#[derive(Debug)]
pub struct PutTicket {
  hold:       Hold,
  generation: u64,
}

pub struct SummaryCache<C> {
  backend: Arc<C>,
  keys:    KeyMap,
}

impl<C> Clone for SummaryCache<C> {
  fn clone(&self) -> Self {
    Self { backend: Arc::clone(&self.backend), keys: Arc::clone(&self.keys) }
  }
}

impl<C> SummaryCache<C> {
  pub fn new(backend: Arc<C>) -> Self {
    Self { backend, keys: Arc::default() }
  }

  pub fn backend(&self) -> &C { &self.backend }

  /// Number of keys whose state is currently tracked.
  pub fn tracked_keys(&self) -> usize { lock(&self.keys).len() }
}

impl<C: CacheStore + 'static> SummaryCache<C> {
  pub async fn lookup(&self, user_id: Uuid, year: i32) -> Lookup {
    let key = summary_key(user_id, year);
    let hold = Hold::acquire(&self.keys, &key);

    let io = hold.with_state(|s| s.bypassed.then(|| Arc::clone(&s.io))).flatten();
    if let Some(io) = io {
      let _io = io.lock().await;
      // Another task may have recovered the key while we waited.
      if hold.with_state(|s| s.bypassed).unwrap_or(false) {
        match self.backend.delete(&key).await {
          Ok(()) => {
            tracing::info!(%key, "summary cache key recovered");
            hold.with_state(|s| s.bypassed = false);
          }
          Err(e) => {
            tracing::warn!(%key, error = %e, "summary cache still unavailable");
            return Lookup::Bypassed;
          }
        }
      }
    }

    let Some(generation) = hold.with_state(|s| s.generation) else {
      return Lookup::Bypassed;
    };
    let ticket = PutTicket { hold, generation };

    match self.backend.get(&key).await {
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(summary) => Lookup::Hit(summary),
        Err(e) => {
          tracing::warn!(%key, error = %e, "undecodable summary cache entry");
          Lookup::Miss(ticket)
        }
      },
      Ok(None) => Lookup::Miss(ticket),
      Err(e) => {
        tracing::warn!(%key, error = %e, "summary cache read failed, treating as miss");
        Lookup::Miss(ticket)
      }
    }
  }

  /// Store `summary` in the background. Returns immediately; failures are
  /// logged and otherwise ignored.
  pub fn put(&self, ticket: PutTicket, summary: &[DaySummary]) -> tokio::task::JoinHandle<()> {
    let value = serde_json::to_string(summary);
    let backend = Arc::clone(&self.backend);

    tokio::spawn(async move {
      let key = ticket.hold.key.clone();
      let value = match value {
        Ok(v) => v,
        Err(e) => {
          tracing::warn!(%key, error = %e, "cannot serialise summary");
          return;
        }
      };

      let Some(io) = ticket.hold.with_state(|s| Arc::clone(&s.io)) else {
        return;
      };
      let _io = io.lock().await;

      let stale = ticket
        .hold
        .with_state(|s| s.bypassed || s.generation != ticket.generation)
        .unwrap_or(true);
      if stale {
        tracing::debug!(%key, "summary changed while computing, not caching");
        return;
      }
      if let Err(e) = backend.set(&key, value).await {
        tracing::warn!(%key, error = %e, "summary cache write failed");
      }
    })
  }

  /// Drop the cached summary of `user_id` in `year`. Never fails; see the
  /// module docs for what happens when the backend does.
  pub async fn invalidate(&self, user_id: Uuid, year: i32) {
    let key = summary_key(user_id, year);
    let hold = Hold::acquire(&self.keys, &key);

    let Some(io) = hold.with_state(|s| {
      s.generation += 1;
      Arc::clone(&s.io)
    }) else {
      return;
    };
    let _io = io.lock().await;

    let result = self.backend.delete(&key).await;
    if let Err(e) = &result {
      tracing::warn!(%key, error = %e, "summary cache invalidation failed, bypassing key");
    }
    hold.with_state(|s| s.bypassed = result.is_err());
  }
}
