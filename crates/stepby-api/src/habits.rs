//! Handlers for `/habits` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/habits` | `?year=...&user_id=...`; habits created by the end of `year` |
//! | `POST`   | `/habits` | Body: [`CreateBody`]; returns 201 + stored habit |
//! | `GET`    | `/habits/{id}` | 404 if not found |
//! | `PUT`    | `/habits/{id}` | Body: [`UpdateBody`] |
//! | `DELETE` | `/habits/{id}` | Removes week days and completion marks too |
//! | `PATCH`  | `/habits/{id}/toggle` | Body: `{"date":"...","user_id":"..."}` |
//! | `PATCH`  | `/habits/{id}/status` | Deactivate, or reactivate if deactivated today |
//!
//! Every mutation invalidates the affected cached year summaries before the
//! response is sent.

use std::collections::BTreeSet;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde::Deserialize;
use stepby_core::{
  cache::CacheStore,
  calendar::{CalendarDay, DateInput, validate_year},
  day::CompletionToggle,
  eligibility::is_deactivated_on,
  habit::{Habit, HabitEdit, LifecycleEvent, NewHabit, Recurrence},
  store::{HabitStore, StoreError},
};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

fn validate_title(title: &str) -> Result<String, ApiError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  Ok(title.to_owned())
}

async fn find_habit<S: HabitStore>(store: &S, id: Uuid) -> Result<Habit, ApiError> {
  store
    .get_habit(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("habit {id} not found")))
}

/// Drop every cached summary a change to `habit` can affect: its creation
/// year and each later year in which the user has day records.
async fn invalidate_habit<S, C>(state: &AppState<S, C>, habit: &Habit) -> Result<(), ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let first = habit.created_at.year();
  let mut years: BTreeSet<i32> = state
    .store
    .day_years(habit.user_id)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .filter(|year| *year >= first)
    .collect();
  years.insert(first);

  for year in years {
    state.cache.invalidate(habit.user_id, year).await;
  }
  Ok(())
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub year:    i32,
  pub user_id: Uuid,
}

/// `GET /habits?year=<year>&user_id=<id>`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<Habit>>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let year = validate_year(params.year)?;
  let (_, last) = CalendarDay::year_bounds(year)
    .ok_or_else(|| ApiError::BadRequest(format!("year {year} out of range")))?;

  let habits = state
    .store
    .list_habits_until(params.user_id, last)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(habits))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /habits/{id}`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Habit>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  Ok(Json(find_habit(state.store.as_ref(), id).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /habits`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:      String,
  pub user_id:    Uuid,
  /// A bare date, or an instant that is normalized to the configured zone.
  pub created_at: DateInput,
  pub recurrence: Recurrence,
}

/// `POST /habits`: returns 201 + the stored [`Habit`].
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let input = NewHabit {
    user_id:    body.user_id,
    title:      validate_title(&body.title)?,
    created_at: state.calendar.normalize_input(body.created_at),
    recurrence: body.recurrence,
  };

  let habit = state.store.add_habit(input).await.map_err(ApiError::store)?;
  invalidate_habit(&state, &habit).await?;

  tracing::info!(habit_id = %habit.habit_id, user_id = %habit.user_id, "habit created");
  Ok((StatusCode::CREATED, Json(habit)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /habits/{id}`. The creation day is immutable.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub title:      String,
  pub recurrence: Recurrence,
}

/// `PUT /habits/{id}`
///
/// Completion marks are kept. Marks on days the new recurrence no longer
/// covers stop counting because they fail eligibility.
pub async fn update<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<Habit>, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let edit = HabitEdit { title: validate_title(&body.title)?, recurrence: body.recurrence };

  let habit = state
    .store
    .update_habit(id, edit)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("habit {id} not found")))?;
  invalidate_habit(&state, &habit).await?;

  Ok(Json(habit))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /habits/{id}`: 204 on success.
pub async fn delete_one<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let habit = state
    .store
    .delete_habit(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("habit {id} not found")))?;
  invalidate_habit(&state, &habit).await?;

  tracing::info!(habit_id = %id, "habit deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Completion toggle ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
  pub date:    DateInput,
  pub user_id: Uuid,
}

/// `PATCH /habits/{id}/toggle`: mark the habit done on `date`, or unmark it
/// if it already was.
///
/// A write that loses a race with a concurrent toggle is retried once; a
/// second loss is reported as 409.
pub async fn toggle_completion<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<ToggleBody>,
) -> Result<Json<CompletionToggle>, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let habit = find_habit(state.store.as_ref(), id).await?;
  if habit.user_id != body.user_id {
    return Err(ApiError::NotFound(format!("habit {id} not found for user {}", body.user_id)));
  }

  let date = state.calendar.normalize_input(body.date);
  let toggle = match state.store.toggle_completion(body.user_id, id, date).await {
    Err(e) if e.is_conflict() => {
      tracing::debug!(habit_id = %id, %date, "toggle lost a race, retrying");
      state
        .store
        .toggle_completion(body.user_id, id, date)
        .await
        .map_err(ApiError::store)?
    }
    other => other.map_err(ApiError::store)?,
  };

  state.cache.invalidate(body.user_id, date.year()).await;
  Ok(Json(toggle))
}

// ─── Lifecycle toggle ────────────────────────────────────────────────────────

/// `PATCH /habits/{id}/status`: deactivate the habit as of now, or reactivate
/// it if it is deactivated today.
pub async fn toggle_status<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Habit>, ApiError>
where
  S: HabitStore,
  C: CacheStore + 'static,
{
  let habit = find_habit(state.store.as_ref(), id).await?;

  let now = Utc::now();
  let stamp = state.calendar.stamp(now);
  let event = if is_deactivated_on(&habit, stamp.day) {
    LifecycleEvent::Reactivated(stamp)
  } else {
    LifecycleEvent::Deactivated(stamp)
  };

  let habit = state
    .store
    .record_lifecycle(id, event)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("habit {id} not found")))?;
  invalidate_habit(&state, &habit).await?;

  tracing::info!(habit_id = %id, ?event, "habit lifecycle changed");
  Ok(Json(habit))
}
