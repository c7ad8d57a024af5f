//! Habit types: the recurring or fixed-date tasks a user tracks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, calendar::CalendarDay};

// ─── Week days ───────────────────────────────────────────────────────────────

/// A non-empty set of week days, 0 = Sunday through 6 = Saturday.
///
/// Serialises as a sorted array of numbers, e.g. `[1, 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekDays(u8);

impl WeekDays {
  /// Build a set from week-day numbers. Duplicates are collapsed.
  pub fn from_days(days: &[u8]) -> Result<Self> {
    let mut bits = 0u8;
    for &day in days {
      if day > 6 {
        return Err(Error::InvalidWeekDay(day));
      }
      bits |= 1 << day;
    }
    if bits == 0 {
      return Err(Error::EmptyWeekDays);
    }
    Ok(Self(bits))
  }

  pub fn contains(self, week_day: u8) -> bool {
    week_day < 7 && self.0 & (1 << week_day) != 0
  }

  pub fn iter(self) -> impl Iterator<Item = u8> {
    (0..7).filter(move |&d| self.contains(d))
  }
}

impl TryFrom<Vec<u8>> for WeekDays {
  type Error = Error;

  fn try_from(days: Vec<u8>) -> Result<Self> { Self::from_days(&days) }
}

impl From<WeekDays> for Vec<u8> {
  fn from(days: WeekDays) -> Self { days.iter().collect() }
}

// ─── Recurrence ──────────────────────────────────────────────────────────────

/// The discriminant stored in the `kind` column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
  Weekly,
  SpecificDate,
}

/// When a habit comes due. Each variant carries exactly the data it needs, so
/// a weekly habit always has week days and a dated habit always has a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
  Weekly { week_days: WeekDays },
  SpecificDate { date: CalendarDay },
}

impl Recurrence {
  pub fn kind(&self) -> RecurrenceKind {
    match self {
      Self::Weekly { .. } => RecurrenceKind::Weekly,
      Self::SpecificDate { .. } => RecurrenceKind::SpecificDate,
    }
  }

  /// Whether the recurrence alone schedules the habit on `day`.
  pub fn matches(&self, day: CalendarDay) -> bool {
    match self {
      Self::Weekly { week_days } => week_days.contains(day.weekday_from_sunday()),
      Self::SpecificDate { date } => *date == day,
    }
  }

  pub fn is_fixed_on(&self, day: CalendarDay) -> bool {
    matches!(self, Self::SpecificDate { date } if *date == day)
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// The moment an activation or deactivation happened.
///
/// `at` orders events against each other; `day` is what date comparisons use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStamp {
  pub at:  DateTime<Utc>,
  pub day: CalendarDay,
}

/// A lifecycle toggle to persist on a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
  Deactivated(LifecycleStamp),
  Reactivated(LifecycleStamp),
}

// ─── Habit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
  pub habit_id:     Uuid,
  pub user_id:      Uuid,
  pub title:        String,
  /// First day on which the habit can count.
  pub created_at:   CalendarDay,
  pub recurrence:   Recurrence,
  pub activation:   Option<LifecycleStamp>,
  pub deactivation: Option<LifecycleStamp>,
}

/// Input to [`crate::store::HabitStore::add_habit`].
#[derive(Debug, Clone)]
pub struct NewHabit {
  pub user_id:    Uuid,
  pub title:      String,
  pub created_at: CalendarDay,
  pub recurrence: Recurrence,
}

/// Replacement fields for [`crate::store::HabitStore::update_habit`].
#[derive(Debug, Clone)]
pub struct HabitEdit {
  pub title:      String,
  pub recurrence: Recurrence,
}
