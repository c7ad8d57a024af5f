//! Calendar normalization.
//!
//! Every date comparison in the system happens on [`CalendarDay`] values, never
//! on raw instants. Instants are turned into days exactly once, here, by
//! converting them into the single configured timezone and dropping the time
//! of day.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, habit::LifecycleStamp};

/// Years a client may ask about.
pub const YEAR_RANGE: RangeInclusive<i32> = 1900..=2999;

pub fn validate_year(year: i32) -> Result<i32> {
  if YEAR_RANGE.contains(&year) { Ok(year) } else { Err(Error::InvalidYear(year)) }
}

// ─── CalendarDay ─────────────────────────────────────────────────────────────

/// A timezone-anchored calendar date. Serialises as `YYYY-MM-DD`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
  pub const FORMAT: &'static str = "%Y-%m-%d";

  pub fn new(date: NaiveDate) -> Self { Self(date) }

  pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
    NaiveDate::from_ymd_opt(year, month, day).map(Self)
  }

  pub fn date(self) -> NaiveDate { self.0 }

  pub fn year(self) -> i32 { self.0.year() }

  /// Day of the week with 0 = Sunday through 6 = Saturday.
  pub fn weekday_from_sunday(self) -> u8 {
    self.0.weekday().num_days_from_sunday() as u8
  }

  /// First and last day of `year`, or `None` if the year is out of chrono's
  /// range.
  pub fn year_bounds(year: i32) -> Option<(Self, Self)> {
    Some((Self::from_ymd(year, 1, 1)?, Self::from_ymd(year, 12, 31)?))
  }
}

impl From<NaiveDate> for CalendarDay {
  fn from(date: NaiveDate) -> Self { Self(date) }
}

impl fmt::Display for CalendarDay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format(Self::FORMAT))
  }
}

impl FromStr for CalendarDay {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    NaiveDate::parse_from_str(s, Self::FORMAT)
      .map(Self)
      .map_err(|_| Error::InvalidDate(s.to_owned()))
  }
}

// ─── DateInput ───────────────────────────────────────────────────────────────

/// A date as supplied by a client: either a bare calendar date or a full
/// RFC 3339 instant that still needs normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DateInput {
  Day(CalendarDay),
  Instant(DateTime<Utc>),
}

impl FromStr for DateInput {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if let Ok(day) = s.parse::<CalendarDay>() {
      return Ok(Self::Day(day));
    }
    DateTime::parse_from_rfc3339(s)
      .map(|dt| Self::Instant(dt.with_timezone(&Utc)))
      .map_err(|_| Error::InvalidDate(s.to_owned()))
  }
}

impl TryFrom<String> for DateInput {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

// ─── Calendar ────────────────────────────────────────────────────────────────

/// The process-wide normalizer. There are no per-user timezones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
  tz: Tz,
}

impl Default for Calendar {
  fn default() -> Self { Self::new(Self::DEFAULT_TIMEZONE) }
}

impl Calendar {
  pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

  pub fn new(tz: Tz) -> Self { Self { tz } }

  /// Build a calendar from an IANA zone name such as `America/Sao_Paulo`.
  pub fn from_name(name: &str) -> Result<Self> {
    name
      .parse::<Tz>()
      .map(Self::new)
      .map_err(|_| Error::UnknownTimezone(name.to_owned()))
  }

  pub fn timezone(&self) -> Tz { self.tz }

  /// Truncate an instant to the calendar day it falls on in this zone.
  pub fn normalize(&self, instant: DateTime<Utc>) -> CalendarDay {
    CalendarDay(instant.with_timezone(&self.tz).date_naive())
  }

  /// Normalize client input. Bare dates are already calendar days and are
  /// returned unchanged.
  pub fn normalize_input(&self, input: DateInput) -> CalendarDay {
    match input {
      DateInput::Day(day) => day,
      DateInput::Instant(instant) => self.normalize(instant),
    }
  }

  pub fn today(&self, now: DateTime<Utc>) -> CalendarDay { self.normalize(now) }

  /// Record `now` as a lifecycle event, keeping both the instant and its day.
  pub fn stamp(&self, now: DateTime<Utc>) -> LifecycleStamp {
    LifecycleStamp { at: now, day: self.normalize(now) }
  }
}
