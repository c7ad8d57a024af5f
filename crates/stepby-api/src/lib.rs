//! JSON REST API for stepby.
//!
//! Exposes an axum [`Router`] backed by any [`HabitStore`] and any
//! [`CacheStore`]. Transport, TLS and tracing layers are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = stepby_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod cache;
pub mod colors;
pub mod days;
pub mod error;
pub mod etag;
pub mod extract;
pub mod habits;
pub mod summary;
pub mod tokens;
pub mod users;
pub mod years;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use serde::Deserialize;
use stepby_core::{cache::CacheStore, calendar::Calendar, store::HabitStore};

pub use cache::SummaryCache;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// How `GET /summary` computes a year on a cache miss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStrategy {
  /// Let the store aggregate in a single query.
  #[default]
  Query,
  /// Load habits and day records and aggregate in process.
  InProcess,
}

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C> {
  pub store:    Arc<S>,
  pub cache:    SummaryCache<C>,
  pub calendar: Calendar,
  pub strategy: SummaryStrategy,
}

impl<S, C> AppState<S, C> {
  pub fn new(store: Arc<S>, cache: Arc<C>, calendar: Calendar) -> Self {
    Self {
      store,
      cache: SummaryCache::new(cache),
      calendar,
      strategy: SummaryStrategy::default(),
    }
  }

  pub fn with_strategy(mut self, strategy: SummaryStrategy) -> Self {
    self.strategy = strategy;
    self
  }
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      cache:    self.cache.clone(),
      calendar: self.calendar,
      strategy: self.strategy,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: HabitStore + 'static,
  C: CacheStore + 'static,
{
  Router::new()
    // Users & push tokens
    .route("/users", post(users::create::<S, C>))
    .route("/users/{email}", get(users::get_one::<S, C>))
    .route("/token", get(tokens::find::<S, C>).post(tokens::create::<S, C>))
    // Habits
    .route("/habits", get(habits::list::<S, C>).post(habits::create::<S, C>))
    .route(
      "/habits/{id}",
      get(habits::get_one::<S, C>)
        .put(habits::update::<S, C>)
        .delete(habits::delete_one::<S, C>),
    )
    .route("/habits/{id}/toggle", patch(habits::toggle_completion::<S, C>))
    .route("/habits/{id}/status", patch(habits::toggle_status::<S, C>))
    // Views
    .route("/day", get(days::snapshot::<S, C>))
    .route("/summary", get(summary::handler::<S, C>))
    // Years & colors
    .route("/years", get(years::list::<S, C>).post(years::create::<S, C>))
    .route("/colors", post(colors::create::<S, C>))
    // GET takes a user id, PUT a palette id.
    .route("/colors/{id}", get(colors::for_user::<S, C>).put(colors::update::<S, C>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
