//! Handlers for `/colors`, the per-user five-color palette.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/colors` | Body: `color_1`..`color_5` plus `user_id` |
//! | `GET`  | `/colors/:user_id` | The user's palette; 404 if none |
//! | `PUT`  | `/colors/{id}` | Body: `color_1`..`color_5`; 404 if unknown |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use stepby_core::{cache::CacheStore, store::HabitStore, user::ColorPalette};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

/// The five colors as flat fields.
#[derive(Debug, Deserialize)]
pub struct Colors {
  pub color_1: String,
  pub color_2: String,
  pub color_3: String,
  pub color_4: String,
  pub color_5: String,
}

impl From<Colors> for [String; 5] {
  fn from(c: Colors) -> Self { [c.color_1, c.color_2, c.color_3, c.color_4, c.color_5] }
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id: Uuid,
  #[serde(flatten)]
  pub colors:  Colors,
}

/// `POST /colors`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let palette = state
    .store
    .add_palette(body.user_id, body.colors.into())
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(palette)))
}

/// `GET /colors/:user_id`
pub async fn for_user<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<ColorPalette>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let palette = state
    .store
    .palette_for_user(user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no colors for user {user_id}")))?;
  Ok(Json(palette))
}

/// `PUT /colors/{id}`
pub async fn update<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<Colors>,
) -> Result<Json<ColorPalette>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let palette = state
    .store
    .update_palette(id, body.into())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no colors with id {id}")))?;
  Ok(Json(palette))
}
