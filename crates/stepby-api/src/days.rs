//! `GET /day?date=<date>&user_id=<id>`: the day snapshot.

use axum::{Json, extract::State};
use serde::Deserialize;
use stepby_core::{
  cache::CacheStore,
  calendar::DateInput,
  snapshot::{DaySnapshot, build_day_snapshot},
  store::HabitStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, extract::ApiQuery};

#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
  pub date:    DateInput,
  pub user_id: Uuid,
}

pub async fn snapshot<S, C>(
  State(state): State<AppState<S, C>>,
  ApiQuery(params): ApiQuery<SnapshotParams>,
) -> Result<Json<DaySnapshot>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let day = state.calendar.normalize_input(params.date);

  let habits = state
    .store
    .list_habits_until(params.user_id, day)
    .await
    .map_err(ApiError::store)?;
  let record = state
    .store
    .get_day(params.user_id, day)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(build_day_snapshot(&habits, day, record.as_ref())))
}
