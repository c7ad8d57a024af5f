//! Handlers for `/token`, the push notification token registry.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/token` | Body: `{"token":"...","user_id":"..."}` |
//! | `GET`  | `/token` | `?token=...`; 404 if unknown |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use stepby_core::{cache::CacheStore, store::HabitStore, user::NotificationToken};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiQuery},
};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub token:   String,
  pub user_id: Uuid,
}

/// `POST /token`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  if body.token.trim().is_empty() {
    return Err(ApiError::BadRequest("token must not be empty".into()));
  }
  let created = state
    .store
    .add_token(body.user_id, body.token)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct FindParams {
  pub token: String,
}

/// `GET /token?token=<token>`
pub async fn find<S, C>(
  State(state): State<AppState<S, C>>,
  ApiQuery(params): ApiQuery<FindParams>,
) -> Result<Json<NotificationToken>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let token = state
    .store
    .find_token(params.token)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("token not registered".into()))?;
  Ok(Json(token))
}
