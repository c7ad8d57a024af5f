//! Year summary: per touched day, how many habits were completed out of how
//! many were possible.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  calendar::CalendarDay,
  day::DayRecord,
  eligibility::{eligible_on, is_eligible},
  habit::Habit,
};

/// One entry of a year summary.
///
/// Counts are `f64` so clients can use them directly as a ratio; a day with
/// `eligible_count == 0.0` is valid and nothing here divides by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
  pub day_id:          Uuid,
  pub date:            CalendarDay,
  pub completed_count: f64,
  pub eligible_count:  f64,
}

/// Aggregate the in-process way: evaluate the eligibility predicate for every
/// day record against the user's habits.
///
/// `days` should already be restricted to a single user and year. The result
/// has one entry per record, sorted by date.
pub fn aggregate_year(habits: &[Habit], days: &[DayRecord]) -> Vec<DaySummary> {
  let mut summary: Vec<DaySummary> = days
    .iter()
    .map(|record| {
      let completed = record
        .completed
        .iter()
        .filter(|id| {
          habits
            .iter()
            .any(|h| h.habit_id == **id && is_eligible(h, record.date))
        })
        .count();
      let eligible = eligible_on(habits, record.date).count();

      DaySummary {
        day_id:          record.day_id,
        date:            record.date,
        completed_count: completed as f64,
        eligible_count:  eligible as f64,
      }
    })
    .collect();

  summary.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.day_id.cmp(&b.day_id)));
  summary
}
