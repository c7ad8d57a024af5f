//! Habit eligibility: whether a habit is due (and counts) on a given day.
//!
//! A habit is eligible on `day` when all of the following hold:
//!
//! 1. `created_at <= day`;
//! 2. its recurrence matches `day` (week day in the set, or the fixed date);
//! 3. it is not deactivated as of `day`.
//!
//! Deactivated as of `day` means a deactivation exists with
//! `deactivation.day <= day`, and no later activation (`deactivation.at <
//! activation.at`) took effect on or before `day`. A dated habit is always
//! eligible on its own date regardless of step 3.

use crate::{calendar::CalendarDay, habit::Habit};

/// Decide whether `habit` is eligible on `day`. Pure.
pub fn is_eligible(habit: &Habit, day: CalendarDay) -> bool {
  if day < habit.created_at {
    return false;
  }
  if !habit.recurrence.matches(day) {
    return false;
  }
  !is_deactivated_on(habit, day) || habit.recurrence.is_fixed_on(day)
}

/// The lifecycle half of the rule, ignoring recurrence and creation date.
pub fn is_deactivated_on(habit: &Habit, day: CalendarDay) -> bool {
  let Some(deactivation) = habit.deactivation else {
    return false;
  };
  if deactivation.day > day {
    return false;
  }
  match habit.activation {
    Some(activation) if deactivation.at < activation.at => activation.day > day,
    _ => true,
  }
}

/// Filter `habits` down to those eligible on `day`, preserving order.
pub fn eligible_on(habits: &[Habit], day: CalendarDay) -> impl Iterator<Item = &Habit> {
  habits.iter().filter(move |h| is_eligible(h, day))
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::{
    calendar::Calendar,
    habit::{LifecycleStamp, Recurrence, WeekDays},
  };

  fn day(y: i32, m: u32, d: u32) -> CalendarDay {
    CalendarDay::from_ymd(y, m, d).unwrap()
  }

  fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 15, 0, 0).unwrap()
  }

  fn stamp(y: i32, m: u32, d: u32) -> LifecycleStamp {
    Calendar::default().stamp(noon(y, m, d))
  }

  fn weekly(created_at: CalendarDay, days: &[u8]) -> Habit {
    Habit {
      habit_id: Uuid::new_v4(),
      user_id: Uuid::nil(),
      title: "Read".into(),
      created_at,
      recurrence: Recurrence::Weekly {
        week_days: WeekDays::from_days(days).unwrap(),
      },
      activation: None,
      deactivation: None,
    }
  }

  fn every_day(created_at: CalendarDay) -> Habit {
    weekly(created_at, &[0, 1, 2, 3, 4, 5, 6])
  }

  fn dated(created_at: CalendarDay, date: CalendarDay) -> Habit {
    Habit {
      recurrence: Recurrence::SpecificDate { date },
      ..weekly(created_at, &[0])
    }
  }

  #[test]
  fn monday_wednesday_habit() {
    // 2024-01-01 is a Monday.
    let h = weekly(day(2024, 1, 1), &[1, 3]);
    assert!(is_eligible(&h, day(2024, 1, 1)));
    assert!(!is_eligible(&h, day(2024, 1, 2)));
    assert!(is_eligible(&h, day(2024, 1, 3)));
  }

  #[test]
  fn weekly_without_lifecycle_follows_week_day_and_creation_floor() {
    let created = day(2024, 3, 5);
    let h = weekly(created, &[2, 6]);
    let mut d = day(2024, 2, 1);
    while d < day(2024, 5, 1) {
      let expected = d >= created && [2, 6].contains(&d.weekday_from_sunday());
      assert_eq!(is_eligible(&h, d), expected, "{d}");
      d = d.date().succ_opt().unwrap().into();
    }
  }

  #[test]
  fn deactivation_is_monotonic() {
    let mut h = every_day(day(2024, 1, 1));
    h.deactivation = Some(stamp(2024, 6, 1));
    assert!(is_eligible(&h, day(2024, 5, 31)));
    assert!(!is_eligible(&h, day(2024, 6, 1)));
    assert!(!is_eligible(&h, day(2024, 12, 31)));
  }

  #[test]
  fn reactivation_reopens_from_activation_day() {
    let mut h = every_day(day(2024, 1, 1));
    h.deactivation = Some(stamp(2024, 6, 1));
    h.activation = Some(stamp(2024, 6, 10));

    assert!(is_eligible(&h, day(2024, 5, 31)));
    assert!(!is_eligible(&h, day(2024, 6, 1)));
    assert!(!is_eligible(&h, day(2024, 6, 9)));
    assert!(is_eligible(&h, day(2024, 6, 10)));
    assert!(is_eligible(&h, day(2024, 8, 1)));
  }

  #[test]
  fn activation_older_than_deactivation_does_not_reactivate() {
    let mut h = every_day(day(2024, 1, 1));
    h.activation = Some(stamp(2024, 3, 1));
    h.deactivation = Some(stamp(2024, 6, 1));
    assert!(is_eligible(&h, day(2024, 4, 1)));
    assert!(!is_eligible(&h, day(2024, 7, 1)));
  }

  #[test]
  fn same_day_deactivate_then_reactivate_keeps_the_day() {
    let cal = Calendar::default();
    let mut h = every_day(day(2024, 1, 1));
    h.deactivation = Some(cal.stamp(Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap()));
    h.activation = Some(cal.stamp(Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap()));
    assert!(is_eligible(&h, day(2024, 6, 1)));
  }

  #[test]
  fn dated_habit_only_on_its_date() {
    let h = dated(day(2024, 1, 1), day(2024, 2, 14));
    assert!(is_eligible(&h, day(2024, 2, 14)));
    assert!(!is_eligible(&h, day(2024, 2, 13)));
    assert!(!is_eligible(&h, day(2024, 2, 21)));
  }

  #[test]
  fn dated_habit_overrides_deactivation_on_its_date() {
    let mut h = dated(day(2024, 1, 1), day(2024, 2, 14));
    h.deactivation = Some(stamp(2024, 2, 1));
    assert!(is_eligible(&h, day(2024, 2, 14)));
  }

  #[test]
  fn dated_habit_still_respects_creation_floor() {
    let h = dated(day(2024, 3, 1), day(2024, 2, 14));
    assert!(!is_eligible(&h, day(2024, 2, 14)));
  }

  #[test]
  fn nothing_is_eligible_before_creation() {
    let h = every_day(day(2024, 1, 10));
    assert!(!is_eligible(&h, day(2024, 1, 9)));
    assert!(is_eligible(&h, day(2024, 1, 10)));
  }

  #[test]
  fn eligible_on_filters_and_keeps_order() {
    let a = weekly(day(2024, 1, 1), &[1]);
    let b = weekly(day(2024, 1, 1), &[2]);
    let c = weekly(day(2024, 1, 1), &[1, 2]);
    let habits = vec![a.clone(), b, c.clone()];
    let ids: Vec<_> = eligible_on(&habits, day(2024, 1, 1)).map(|h| h.habit_id).collect();
    assert_eq!(ids, vec![a.habit_id, c.habit_id]);
  }
}
