//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Body: `{"email":"..."}`; 409 if taken |
//! | `GET`  | `/users/:email` | 404 if not found |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use stepby_core::{cache::CacheStore, store::HabitStore, user::User};

use crate::{
  AppState,
  error::ApiError,
  extract::{ApiJson, ApiPath},
};

/// Light structural check: exactly one `@` with something on both sides.
pub(crate) fn validate_email(email: &str) -> Result<String, ApiError> {
  let email = email.trim();
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
      Ok(email.to_owned())
    }
    _ => Err(ApiError::BadRequest(format!("invalid email address: {email:?}"))),
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub email: String,
}

/// `POST /users`: body: `{"email":"ana@example.com"}`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  ApiJson(body): ApiJson<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let email = validate_email(&body.email)?;
  let user = state.store.add_user(email).await.map_err(ApiError::store)?;
  tracing::info!(user_id = %user.user_id, "user registered");
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/:email`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  ApiPath(email): ApiPath<String>,
) -> Result<Json<User>, ApiError>
where
  S: HabitStore,
  C: CacheStore,
{
  let email = validate_email(&email)?;
  let user = state
    .store
    .find_user_by_email(email.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {email} not found")))?;
  Ok(Json(user))
}
