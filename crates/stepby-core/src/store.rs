//! The `HabitStore` trait: everything the core needs from persistence.
//!
//! The trait is implemented by storage backends (e.g. `stepby-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  calendar::CalendarDay,
  day::{CompletionToggle, DayRecord},
  habit::{Habit, HabitEdit, LifecycleEvent, NewHabit},
  summary::DaySummary,
  user::{ColorPalette, NotificationToken, User, Year},
};

/// Errors a store can report that callers need to tell apart.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// A uniqueness constraint rejected the write, typically because a
  /// concurrent request got there first. Retrying may succeed.
  fn is_conflict(&self) -> bool;

  /// The write referenced a user or habit that does not exist.
  fn is_missing_reference(&self) -> bool { false }
}

/// Abstraction over a stepby storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`). Lookups of missing rows return
/// `Ok(None)` rather than an error.
pub trait HabitStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Register a user. Fails with a conflict if the email is taken.
  fn add_user(
    &self,
    email: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Notification tokens ───────────────────────────────────────────────

  fn add_token(
    &self,
    user_id: Uuid,
    token: String,
  ) -> impl Future<Output = Result<NotificationToken, Self::Error>> + Send + '_;

  fn find_token(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<NotificationToken>, Self::Error>> + Send + '_;

  /// Every registered token, across all users.
  fn list_tokens(
    &self,
  ) -> impl Future<Output = Result<Vec<NotificationToken>, Self::Error>> + Send + '_;

  // ── Years ─────────────────────────────────────────────────────────────

  /// The user's registered years in ascending order.
  fn list_years(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Year>, Self::Error>> + Send + '_;

  fn find_year(
    &self,
    user_id: Uuid,
    year_number: i32,
  ) -> impl Future<Output = Result<Option<Year>, Self::Error>> + Send + '_;

  fn add_year(
    &self,
    user_id: Uuid,
    year_number: i32,
  ) -> impl Future<Output = Result<Year, Self::Error>> + Send + '_;

  // ── Color palettes ────────────────────────────────────────────────────

  fn add_palette(
    &self,
    user_id: Uuid,
    colors: [String; 5],
  ) -> impl Future<Output = Result<ColorPalette, Self::Error>> + Send + '_;

  fn palette_for_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<ColorPalette>, Self::Error>> + Send + '_;

  /// Replace a palette's colors. Returns `None` if `color_id` is unknown.
  fn update_palette(
    &self,
    color_id: Uuid,
    colors: [String; 5],
  ) -> impl Future<Output = Result<Option<ColorPalette>, Self::Error>> + Send + '_;

  // ── Habits ────────────────────────────────────────────────────────────

  fn add_habit(
    &self,
    input: NewHabit,
  ) -> impl Future<Output = Result<Habit, Self::Error>> + Send + '_;

  fn get_habit(
    &self,
    habit_id: Uuid,
  ) -> impl Future<Output = Result<Option<Habit>, Self::Error>> + Send + '_;

  /// All of the user's habits, ordered by `created_at` then id.
  fn list_habits(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Habit>, Self::Error>> + Send + '_;

  /// The user's habits created on or before `until`, ordered by `created_at`.
  fn list_habits_until(
    &self,
    user_id: Uuid,
    until: CalendarDay,
  ) -> impl Future<Output = Result<Vec<Habit>, Self::Error>> + Send + '_;

  /// Replace title and recurrence. Completion marks are kept. Returns `None`
  /// if the habit does not exist.
  fn update_habit(
    &self,
    habit_id: Uuid,
    edit: HabitEdit,
  ) -> impl Future<Output = Result<Option<Habit>, Self::Error>> + Send + '_;

  /// Persist an activation or deactivation. Returns `None` if the habit does
  /// not exist.
  fn record_lifecycle(
    &self,
    habit_id: Uuid,
    event: LifecycleEvent,
  ) -> impl Future<Output = Result<Option<Habit>, Self::Error>> + Send + '_;

  /// Delete a habit with its week days and completion marks. Returns the
  /// deleted habit, or `None` if it did not exist.
  fn delete_habit(
    &self,
    habit_id: Uuid,
  ) -> impl Future<Output = Result<Option<Habit>, Self::Error>> + Send + '_;

  // ── Days & completions ────────────────────────────────────────────────

  fn get_day(
    &self,
    user_id: Uuid,
    date: CalendarDay,
  ) -> impl Future<Output = Result<Option<DayRecord>, Self::Error>> + Send + '_;

  /// Every day record of the user within `year`, ascending by date.
  fn list_days(
    &self,
    user_id: Uuid,
    year: i32,
  ) -> impl Future<Output = Result<Vec<DayRecord>, Self::Error>> + Send + '_;

  /// Distinct years in which the user has at least one day record, ascending.
  fn day_years(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<i32>, Self::Error>> + Send + '_;

  /// Flip the completion mark of `habit_id` on `date`, creating the day
  /// record if needed. Runs atomically; a lost race is reported as a
  /// conflict (see [`StoreError::is_conflict`]).
  fn toggle_completion(
    &self,
    user_id: Uuid,
    habit_id: Uuid,
    date: CalendarDay,
  ) -> impl Future<Output = Result<CompletionToggle, Self::Error>> + Send + '_;

  // ── Aggregation ───────────────────────────────────────────────────────

  /// Year summary computed inside the backend. Must agree exactly with
  /// [`crate::summary::aggregate_year`] over [`Self::list_habits`] and
  /// [`Self::list_days`].
  fn year_summary(
    &self,
    user_id: Uuid,
    year: i32,
  ) -> impl Future<Output = Result<Vec<DaySummary>, Self::Error>> + Send + '_;
}
