//! Day records and completion marks.
//!
//! A day record exists for every (user, date) on which a completion toggle
//! ever happened. The marks on it are the habits completed that day.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::CalendarDay;

/// A touched day with the ids of the habits marked complete on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
  pub day_id:    Uuid,
  pub user_id:   Uuid,
  pub date:      CalendarDay,
  /// Habit ids with a completion mark, in no particular order.
  pub completed: Vec<Uuid>,
}

/// What a completion toggle did to the (day, habit) mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
  Marked,
  Unmarked,
}

/// Result of [`crate::store::HabitStore::toggle_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionToggle {
  pub day_id:   Uuid,
  pub habit_id: Uuid,
  pub date:     CalendarDay,
  pub outcome:  ToggleOutcome,
}
