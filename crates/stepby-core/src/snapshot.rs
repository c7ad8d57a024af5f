//! Day snapshot: what was possible and what was done on one date.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  calendar::CalendarDay,
  day::DayRecord,
  eligibility::{eligible_on, is_eligible},
  habit::Habit,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
  pub date:             CalendarDay,
  /// Habits eligible on `date`, ordered by creation day then id.
  pub possible_habits:  Vec<Habit>,
  /// Completed habits that are still eligible on `date`, sorted.
  pub completed_habits: Vec<Uuid>,
  /// `false` when no day record exists for the date at all.
  pub recorded:         bool,
}

impl DaySnapshot {
  pub fn possible_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
    self.possible_habits.iter().map(|h| h.habit_id)
  }
}

/// Build the snapshot for `day` from the user's habits and the day record, if
/// one exists.
///
/// Marks on habits that are no longer eligible that day (for instance after a
/// deactivation) are left out of the view; they remain in storage.
pub fn build_day_snapshot(
  habits: &[Habit],
  day: CalendarDay,
  record: Option<&DayRecord>,
) -> DaySnapshot {
  let mut possible_habits: Vec<Habit> = eligible_on(habits, day).cloned().collect();
  possible_habits.sort_by(|a, b| {
    a.created_at
      .cmp(&b.created_at)
      .then_with(|| a.habit_id.cmp(&b.habit_id))
  });

  let mut completed_habits: Vec<Uuid> = record
    .map(|r| {
      r.completed
        .iter()
        .copied()
        .filter(|id| {
          habits
            .iter()
            .any(|h| h.habit_id == *id && is_eligible(h, day))
        })
        .collect()
    })
    .unwrap_or_default();
  completed_habits.sort();
  completed_habits.dedup();

  DaySnapshot {
    date: day,
    possible_habits,
    completed_habits,
    recorded: record.is_some(),
  }
}
