//! Router tests against an in-memory SQLite store.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use chrono::Utc;
use serde_json::{Value, json};
use stepby_core::{
  cache::{CacheStore, MemoryCache, summary_key},
  calendar::Calendar,
};
use stepby_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, SummaryStrategy, api_router};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("cache unavailable")]
struct Unavailable;

/// A memory cache whose operations can be made to fail on demand.
#[derive(Default)]
struct FlakyCache {
  inner:        MemoryCache,
  fail_reads:   AtomicBool,
  fail_writes:  AtomicBool,
  fail_deletes: AtomicBool,
}

impl CacheStore for FlakyCache {
  type Error = Unavailable;

  async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>, Unavailable> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(Unavailable);
    }
    Ok(self.inner.get(key).await.unwrap_or_default())
  }

  async fn set<'a>(&'a self, key: &'a str, value: String) -> Result<(), Unavailable> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(Unavailable);
    }
    let _ = self.inner.set(key, value).await;
    Ok(())
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<(), Unavailable> {
    if self.fail_deletes.load(Ordering::SeqCst) {
      return Err(Unavailable);
    }
    let _ = self.inner.delete(key).await;
    Ok(())
  }
}

struct Harness {
  state: AppState<SqliteStore, FlakyCache>,
  cache: Arc<FlakyCache>,
}

impl Harness {
  async fn new() -> Self { Self::with_strategy(SummaryStrategy::Query).await }

  async fn with_strategy(strategy: SummaryStrategy) -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cache = Arc::new(FlakyCache::default());
    let state = AppState::new(Arc::new(store), Arc::clone(&cache), Calendar::default())
      .with_strategy(strategy);
    Self { state, cache }
  }

  fn router(&self) -> Router { api_router(self.state.clone()) }

  async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    self.router().oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let resp = self.send(method, uri, body).await;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  async fn user(&self) -> Uuid {
    let email = format!("{}@example.com", Uuid::new_v4());
    let (status, user) = self.json("POST", "/users", Some(json!({ "email": email }))).await;
    assert_eq!(status, StatusCode::CREATED);
    user["user_id"].as_str().unwrap().parse().unwrap()
  }

  async fn habit(&self, user_id: Uuid, created_at: &str, recurrence: Value) -> Uuid {
    let (status, habit) = self
      .json(
        "POST",
        "/habits",
        Some(json!({
          "title": "Run",
          "user_id": user_id,
          "created_at": created_at,
          "recurrence": recurrence,
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{habit}");
    habit["habit_id"].as_str().unwrap().parse().unwrap()
  }

  async fn toggle(&self, user_id: Uuid, habit_id: Uuid, date: &str) -> Value {
    let (status, body) = self
      .json(
        "PATCH",
        &format!("/habits/{habit_id}/toggle"),
        Some(json!({ "date": date, "user_id": user_id })),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
  }

  async fn summary(&self, user_id: Uuid, year: i32) -> Value {
    let (status, body) =
      self.json("GET", &format!("/summary?year={year}&user_id={user_id}"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
  }

  /// Fetch a summary and wait for the background cache write to land.
  async fn warm(&self, user_id: Uuid, year: i32) -> Value {
    let body = self.summary(user_id, year).await;
    let key = summary_key(user_id, year);
    for _ in 0..100 {
      if self.cache.inner.contains_key(&key) {
        break;
      }
      tokio::task::yield_now().await;
    }
    assert!(self.cache.inner.contains_key(&key), "summary was not cached");
    body
  }

  fn cached(&self, user_id: Uuid, year: i32) -> bool {
    self.cache.inner.contains_key(&summary_key(user_id, year))
  }
}

fn every_day() -> Value { json!({ "kind": "weekly", "week_days": [0, 1, 2, 3, 4, 5, 6] }) }

// ─── Users, tokens, years, colors ────────────────────────────────────────────

#[tokio::test]
async fn users_register_once_and_validate_email() {
  let h = Harness::new().await;

  let (status, _) = h.json("POST", "/users", Some(json!({ "email": "ana@example.com" }))).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) = h.json("POST", "/users", Some(json!({ "email": "ana@example.com" }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());

  let (status, _) = h.json("POST", "/users", Some(json!({ "email": "not-an-email" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, user) = h.json("GET", "/users/ana@example.com", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(user["email"], "ana@example.com");

  let (status, _) = h.json("GET", "/users/bo@example.com", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tokens_register_and_resolve() {
  let h = Harness::new().await;
  let user_id = h.user().await;

  let (status, _) = h
    .json("POST", "/token", Some(json!({ "token": "ExponentPushToken[a]", "user_id": user_id })))
    .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, token) = h.json("GET", "/token?token=ExponentPushToken%5Ba%5D", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(token["user_id"], user_id.to_string());

  let (status, _) = h.json("GET", "/token?token=missing", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn years_are_validated_and_unique() {
  let h = Harness::new().await;
  let user_id = h.user().await;

  let (status, _) =
    h.json("POST", "/years", Some(json!({ "year_number": 2024, "user_id": user_id }))).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) =
    h.json("POST", "/years", Some(json!({ "year_number": 2024, "user_id": user_id }))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].as_str().unwrap().contains("2024"));

  let (status, _) =
    h.json("POST", "/years", Some(json!({ "year_number": 1899, "user_id": user_id }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  h.json("POST", "/years", Some(json!({ "year_number": 2022, "user_id": user_id }))).await;
  let (_, years) = h.json("GET", &format!("/years?user_id={user_id}"), None).await;
  let numbers: Vec<i64> =
    years.as_array().unwrap().iter().map(|y| y["year_number"].as_i64().unwrap()).collect();
  assert_eq!(numbers, [2022, 2024]);
}

#[tokio::test]
async fn colors_create_fetch_and_update() {
  let h = Harness::new().await;
  let user_id = h.user().await;

  let (status, palette) = h
    .json(
      "POST",
      "/colors",
      Some(json!({
        "user_id": user_id,
        "color_1": "#000", "color_2": "#111", "color_3": "#222",
        "color_4": "#333", "color_5": "#444",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  let color_id = palette["color_id"].as_str().unwrap().to_owned();

  let (status, updated) = h
    .json(
      "PUT",
      &format!("/colors/{color_id}"),
      Some(json!({
        "color_1": "#fff", "color_2": "#eee", "color_3": "#ddd",
        "color_4": "#ccc", "color_5": "#bbb",
      })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["colors"][0], "#fff");

  let (status, fetched) = h.json("GET", &format!("/colors/{user_id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched, updated);

  let (status, _) = h.json("GET", &format!("/colors/{}", Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Habits & days ───────────────────────────────────────────────────────────

#[tokio::test]
async fn habit_validation_errors_use_the_error_envelope() {
  let h = Harness::new().await;
  let user_id = h.user().await;

  for recurrence in [
    json!({ "kind": "weekly", "week_days": [] }),
    json!({ "kind": "weekly", "week_days": [7] }),
  ] {
    let (status, body) = h
      .json(
        "POST",
        "/habits",
        Some(json!({
          "title": "Run", "user_id": user_id, "created_at": "2024-01-01",
          "recurrence": recurrence,
        })),
      )
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  let (status, _) = h
    .json(
      "POST",
      "/habits",
      Some(json!({
        "title": "Run", "user_id": Uuid::new_v4(), "created_at": "2024-01-01",
        "recurrence": every_day(),
      })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = h.json("GET", &format!("/habits?year=3000&user_id={user_id}"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn created_at_instants_are_normalized_to_the_local_day() {
  let h = Harness::new().await;
  let user_id = h.user().await;

  // 02:00 UTC on Jan 2 is still Jan 1 in São Paulo (UTC-3).
  let (_, habit) = h
    .json(
      "POST",
      "/habits",
      Some(json!({
        "title": "Run", "user_id": user_id, "created_at": "2024-01-02T02:00:00Z",
        "recurrence": every_day(),
      })),
    )
    .await;
  assert_eq!(habit["created_at"], "2024-01-01");
}

#[tokio::test]
async fn habits_list_by_year_in_creation_order() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let first = h.habit(user_id, "2023-05-01", every_day()).await;
  let second = h.habit(user_id, "2024-02-01", every_day()).await;
  h.habit(user_id, "2025-01-01", every_day()).await;

  let (_, habits) = h.json("GET", &format!("/habits?year=2024&user_id={user_id}"), None).await;
  let ids: Vec<&str> =
    habits.as_array().unwrap().iter().map(|h| h["habit_id"].as_str().unwrap()).collect();
  assert_eq!(ids, [first.to_string(), second.to_string()]);
}

#[tokio::test]
async fn monday_wednesday_habit_day_snapshots() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", json!({ "kind": "weekly", "week_days": [1, 3] })).await;

  // Monday 2024-01-08, before anything was recorded.
  let (_, monday) = h.json("GET", &format!("/day?date=2024-01-08&user_id={user_id}"), None).await;
  assert_eq!(monday["possible_habits"][0]["habit_id"], habit_id.to_string());
  assert_eq!(monday["completed_habits"], json!([]));
  assert_eq!(monday["recorded"], false);

  // Tuesday: nothing possible.
  let (_, tuesday) = h.json("GET", &format!("/day?date=2024-01-09&user_id={user_id}"), None).await;
  assert_eq!(tuesday["possible_habits"], json!([]));

  // Before creation: nothing possible.
  let (_, before) = h.json("GET", &format!("/day?date=2023-12-27&user_id={user_id}"), None).await;
  assert_eq!(before["possible_habits"], json!([]));

  h.toggle(user_id, habit_id, "2024-01-08").await;
  let (_, monday) = h.json("GET", &format!("/day?date=2024-01-08&user_id={user_id}"), None).await;
  assert_eq!(monday["completed_habits"], json!([habit_id]));
  assert_eq!(monday["recorded"], true);
}

#[tokio::test]
async fn toggle_twice_is_a_no_op() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;

  let first = h.toggle(user_id, habit_id, "2024-03-03").await;
  assert_eq!(first["outcome"], "marked");
  let second = h.toggle(user_id, habit_id, "2024-03-03").await;
  assert_eq!(second["outcome"], "unmarked");

  let (_, day) = h.json("GET", &format!("/day?date=2024-03-03&user_id={user_id}"), None).await;
  assert_eq!(day["completed_habits"], json!([]));
}

#[tokio::test]
async fn toggle_rejects_another_users_habit() {
  let h = Harness::new().await;
  let owner = h.user().await;
  let other = h.user().await;
  let habit_id = h.habit(owner, "2024-01-01", every_day()).await;

  let (status, _) = h
    .json(
      "PATCH",
      &format!("/habits/{habit_id}/toggle"),
      Some(json!({ "date": "2024-01-02", "user_id": other })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_toggle_deactivates_then_reactivates_today() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2020-01-01", every_day()).await;
  let today = Calendar::default().today(Utc::now());
  let day_uri = format!("/day?date={today}&user_id={user_id}");

  let (status, habit) = h.json("PATCH", &format!("/habits/{habit_id}/status"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(habit["deactivation"].is_object());
  let (_, day) = h.json("GET", &day_uri, None).await;
  assert_eq!(day["possible_habits"], json!([]));

  let (_, habit) = h.json("PATCH", &format!("/habits/{habit_id}/status"), None).await;
  assert!(habit["activation"].is_object());
  let (_, day) = h.json("GET", &day_uri, None).await;
  assert_eq!(day["possible_habits"][0]["habit_id"], habit_id.to_string());
}

#[tokio::test]
async fn delete_removes_the_habit_and_its_marks() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-01-01").await;

  let resp = h.send("DELETE", &format!("/habits/{habit_id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let (status, _) = h.json("GET", &format!("/habits/{habit_id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let resp = h.send("DELETE", &format!("/habits/{habit_id}"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let summary = h.summary(user_id, 2024).await;
  assert_eq!(summary[0]["completed_count"], 0.0);
  assert_eq!(summary[0]["eligible_count"], 0.0);
}

// ─── Summary & cache ─────────────────────────────────────────────────────────

#[tokio::test]
async fn sparse_summary_lists_only_recorded_days() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let a = h.habit(user_id, "2024-01-01", every_day()).await;
  h.habit(user_id, "2024-01-01", every_day()).await;

  h.toggle(user_id, a, "2024-01-01").await;
  h.toggle(user_id, a, "2024-01-03").await;

  let summary = h.summary(user_id, 2024).await;
  let entries = summary.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0]["date"], "2024-01-01");
  assert_eq!(entries[1]["date"], "2024-01-03");
  for entry in entries {
    assert_eq!(entry["completed_count"], 1.0);
    assert_eq!(entry["eligible_count"], 2.0);
  }
}

#[tokio::test]
async fn both_strategies_serve_identical_summaries() {
  let query = Harness::with_strategy(SummaryStrategy::Query).await;
  let in_process = Harness::with_strategy(SummaryStrategy::InProcess).await;

  // Same data in both stores; ids differ, so compare everything but ids.
  let mut results = Vec::new();
  for h in [&query, &in_process] {
    let user_id = h.user().await;
    let weekly = h.habit(user_id, "2024-01-01", json!({ "kind": "weekly", "week_days": [1, 3] })).await;
    let dated = h
      .habit(user_id, "2024-01-01", json!({ "kind": "specific_date", "date": "2024-01-10" }))
      .await;
    for date in ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-10"] {
      h.toggle(user_id, weekly, date).await;
      h.toggle(user_id, dated, date).await;
    }
    let summary = h.summary(user_id, 2024).await;
    let stripped: Vec<Value> = summary
      .as_array()
      .unwrap()
      .iter()
      .map(|e| json!([e["date"], e["completed_count"], e["eligible_count"]]))
      .collect();
    results.push(stripped);
  }
  assert_eq!(results[0], results[1]);
  assert_eq!(results[0][3], json!(["2024-01-10", 2.0, 2.0]));
}

#[tokio::test]
async fn warm_cache_matches_fresh_computation() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-02-02").await;

  let fresh = h.warm(user_id, 2024).await;
  let warm = h.summary(user_id, 2024).await;
  assert_eq!(fresh, warm);
}

#[tokio::test]
async fn every_mutation_invalidates_the_cached_summary() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-01-01").await;

  // Completion toggle.
  h.warm(user_id, 2024).await;
  h.toggle(user_id, habit_id, "2024-01-02").await;
  assert!(!h.cached(user_id, 2024));
  let summary = h.summary(user_id, 2024).await;
  assert_eq!(summary.as_array().unwrap().len(), 2);

  // Edit.
  h.warm(user_id, 2024).await;
  let (status, _) = h
    .json(
      "PUT",
      &format!("/habits/{habit_id}"),
      Some(json!({ "title": "Walk", "recurrence": { "kind": "weekly", "week_days": [0] } })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert!(!h.cached(user_id, 2024));

  // Lifecycle toggle.
  h.warm(user_id, 2024).await;
  h.json("PATCH", &format!("/habits/{habit_id}/status"), None).await;
  assert!(!h.cached(user_id, 2024));

  // Creation of another habit.
  h.warm(user_id, 2024).await;
  h.habit(user_id, "2024-06-01", every_day()).await;
  assert!(!h.cached(user_id, 2024));

  // Deletion.
  h.warm(user_id, 2024).await;
  h.send("DELETE", &format!("/habits/{habit_id}"), None).await;
  assert!(!h.cached(user_id, 2024));
}

#[tokio::test]
async fn habit_changes_invalidate_later_years_too() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2023-06-01", every_day()).await;
  h.toggle(user_id, habit_id, "2023-06-02").await;
  h.toggle(user_id, habit_id, "2024-06-02").await;

  h.warm(user_id, 2023).await;
  h.warm(user_id, 2024).await;

  h.send("DELETE", &format!("/habits/{habit_id}"), None).await;
  assert!(!h.cached(user_id, 2023));
  assert!(!h.cached(user_id, 2024));
}

#[tokio::test]
async fn failed_cache_reads_and_writes_fall_back_to_the_store() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-01-01").await;

  h.cache.fail_reads.store(true, Ordering::SeqCst);
  h.cache.fail_writes.store(true, Ordering::SeqCst);

  let summary = h.summary(user_id, 2024).await;
  assert_eq!(summary[0]["completed_count"], 1.0);
}

#[tokio::test]
async fn failed_invalidation_never_serves_a_stale_summary() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-01-01").await;
  h.warm(user_id, 2024).await;

  h.cache.fail_deletes.store(true, Ordering::SeqCst);
  h.toggle(user_id, habit_id, "2024-01-01").await;
  // The stale entry is still in the backend...
  assert!(h.cached(user_id, 2024));
  // ...but is not served.
  let summary = h.summary(user_id, 2024).await;
  assert_eq!(summary[0]["completed_count"], 0.0);

  // Once the backend recovers, the next read clears the stale entry.
  h.cache.fail_deletes.store(false, Ordering::SeqCst);
  let summary = h.summary(user_id, 2024).await;
  assert_eq!(summary[0]["completed_count"], 0.0);
  let again = h.warm(user_id, 2024).await;
  assert_eq!(again, summary);
}

#[tokio::test]
async fn summaries_of_unknown_users_leave_no_cache_state() {
  let h = Harness::new().await;
  for _ in 0..200 {
    assert_eq!(h.summary(Uuid::new_v4(), 2024).await, json!([]));
  }
  for _ in 0..100 {
    if h.state.cache.tracked_keys() == 0 {
      break;
    }
    tokio::task::yield_now().await;
  }
  assert_eq!(h.state.cache.tracked_keys(), 0);
}

#[tokio::test]
async fn summary_honours_if_none_match() {
  let h = Harness::new().await;
  let user_id = h.user().await;
  let habit_id = h.habit(user_id, "2024-01-01", every_day()).await;
  h.toggle(user_id, habit_id, "2024-01-01").await;

  let uri = format!("/summary?year=2024&user_id={user_id}");
  let resp = h.send("GET", &uri, None).await;
  let etag = resp.headers().get(header::ETAG).unwrap().to_str().unwrap().to_owned();

  let req = Request::builder()
    .uri(&uri)
    .header(header::IF_NONE_MATCH, &etag)
    .body(Body::empty())
    .unwrap();
  let resp = h.router().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

  h.toggle(user_id, habit_id, "2024-01-02").await;
  let req = Request::builder()
    .uri(&uri)
    .header(header::IF_NONE_MATCH, &etag)
    .body(Body::empty())
    .unwrap();
  let resp = h.router().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
  assert_ne!(resp.headers().get(header::ETAG).unwrap().to_str().unwrap(), etag);
}
