//! `GET /summary?year=<year>&user_id=<id>`: the year summary.
//!
//! Served from the summary cache when possible. The response carries an
//! `ETag`; a matching `If-None-Match` gets `304 Not Modified`.

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use stepby_core::{
  cache::CacheStore,
  calendar::validate_year,
  store::HabitStore,
  summary::{DaySummary, aggregate_year},
};
use uuid::Uuid;

use crate::{
  AppState, SummaryStrategy,
  cache::Lookup,
  error::ApiError,
  etag::{if_none_match, summary_etag},
  extract::ApiQuery,
};

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub year:    i32,
  pub user_id: Uuid,
}

/// Compute a summary from the store, bypassing the cache.
pub async fn compute<S, C>(
  state: &AppState<S, C>,
  user_id: Uuid,
  year: i32,
) -> Result<Vec<DaySummary>, ApiError>
where
  S: HabitStore,
{
  match state.strategy {
    SummaryStrategy::Query => {
      state.store.year_summary(user_id, year).await.map_err(ApiError::store)
    }
    SummaryStrategy::InProcess => {
      let habits = state.store.list_habits(user_id).await.map_err(ApiError::store)?;
      let days = state.store.list_days(user_id, year).await.map_err(ApiError::store)?;
      Ok(aggregate_year(&habits, &days))
    }
  }
}

pub async fn handler<S, C>(
  State(state): State<AppState<S, C>>,
  headers: HeaderMap,
  ApiQuery(params): ApiQuery<SummaryParams>,
) -> Result<Response, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let year = validate_year(params.year)?;

  let summary = match state.cache.lookup(params.user_id, year).await {
    Lookup::Hit(summary) => {
      tracing::debug!(user_id = %params.user_id, year, "summary cache hit");
      summary
    }
    Lookup::Miss(ticket) => {
      let summary = compute(&state, params.user_id, year).await?;
      state.cache.put(ticket, &summary);
      summary
    }
    Lookup::Bypassed => compute(&state, params.user_id, year).await?,
  };

  let etag = summary_etag(&summary);
  let not_modified = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| if_none_match(v, &etag));

  if not_modified {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }
  Ok(([(header::ETAG, etag)], Json(summary)).into_response())
}
