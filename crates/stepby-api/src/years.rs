//! Handlers for `/years`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/years` | `?user_id=...`; ascending by year |
//! | `POST` | `/years` | Body: `{"year_number":2024,"user_id":"..."}`; 422 if it exists |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use stepby_core::{
  cache::CacheStore,
  calendar::validate_year,
  store::{HabitStore, StoreError},
  user::Year,
};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiQuery},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id: Uuid,
}

/// `GET /years?user_id=<id>`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<Year>>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let years = state
    .store
    .list_years(params.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(years))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub year_number: i32,
  pub user_id:     Uuid,
}

/// `POST /years`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let year_number = validate_year(body.year_number)?;
  let exists = || ApiError::Unprocessable(format!("year {year_number} already exists"));

  if state
    .store
    .find_year(body.user_id, year_number)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(exists());
  }

  let year = match state.store.add_year(body.user_id, year_number).await {
    Ok(year) => year,
    // Lost a race with an identical request.
    Err(e) if e.is_conflict() => return Err(exists()),
    Err(e) => return Err(ApiError::store(e)),
  };
  Ok((StatusCode::CREATED, Json(year)))
}
