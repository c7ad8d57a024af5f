//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Instants are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that lexicographic order equals time order.
//! Calendar days are stored as `YYYY-MM-DD`. UUIDs are stored hyphenated.

use chrono::{DateTime, SecondsFormat, Utc};
use stepby_core::{
  calendar::CalendarDay,
  day::DayRecord,
  habit::{Habit, LifecycleStamp, Recurrence, RecurrenceKind, WeekDays},
  user::{ColorPalette, NotificationToken, User, Year},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_day(day: CalendarDay) -> String { day.to_string() }

pub fn decode_day(s: &str) -> Result<CalendarDay> {
  s.parse().map_err(|_| Error::DateParse(format!("bad calendar day: {s:?}")))
}

/// Inverse of SQLite `group_concat` over week-day integers, e.g. `"1,3"`.
pub fn decode_week_days(s: &str) -> Result<WeekDays> {
  let days = s
    .split(',')
    .map(|d| {
      d.trim()
        .parse::<u8>()
        .map_err(|_| Error::Decode(format!("bad week day: {d:?}")))
    })
    .collect::<Result<Vec<u8>>>()?;
  Ok(WeekDays::from_days(&days)?)
}

/// Inverse of SQLite `group_concat` over UUID columns; `None` means no rows.
pub fn decode_uuid_list(s: Option<&str>) -> Result<Vec<Uuid>> {
  match s {
    None | Some("") => Ok(Vec::new()),
    Some(s) => s.split(',').map(decode_uuid).collect(),
  }
}

fn decode_stamp(at: Option<String>, day: Option<String>) -> Result<Option<LifecycleStamp>> {
  match (at, day) {
    (Some(at), Some(day)) => Ok(Some(LifecycleStamp {
      at:  decode_dt(&at)?,
      day: decode_day(&day)?,
    })),
    _ => Ok(None),
  }
}

/// Column values for a lifecycle stamp: `(at, day)`.
pub fn encode_stamp(stamp: &LifecycleStamp) -> (String, String) {
  (encode_dt(stamp.at), encode_day(stamp.day))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawHabit`]; expects `habits` aliased as `h`.
pub const HABIT_COLUMNS: &str = "
  h.habit_id, h.user_id, h.title, h.created_day, h.kind, h.habit_date,
  h.activation_at, h.activation_day, h.deactivation_at, h.deactivation_day,
  (SELECT group_concat(w.week_day) FROM habit_week_days w
    WHERE w.habit_id = h.habit_id) AS week_days
";

/// Raw strings read directly from a `habits` row plus its week days.
pub struct RawHabit {
  pub habit_id:         String,
  pub user_id:          String,
  pub title:            String,
  pub created_day:      String,
  pub kind:             String,
  pub habit_date:       Option<String>,
  pub activation_at:    Option<String>,
  pub activation_day:   Option<String>,
  pub deactivation_at:  Option<String>,
  pub deactivation_day: Option<String>,
  pub week_days:        Option<String>,
}

impl RawHabit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      habit_id:         row.get(0)?,
      user_id:          row.get(1)?,
      title:            row.get(2)?,
      created_day:      row.get(3)?,
      kind:             row.get(4)?,
      habit_date:       row.get(5)?,
      activation_at:    row.get(6)?,
      activation_day:   row.get(7)?,
      deactivation_at:  row.get(8)?,
      deactivation_day: row.get(9)?,
      week_days:        row.get(10)?,
    })
  }

  pub fn into_habit(self) -> Result<Habit> {
    let kind: RecurrenceKind = self
      .kind
      .parse()
      .map_err(|_| Error::Decode(format!("unknown recurrence kind: {:?}", self.kind)))?;

    let recurrence = match kind {
      RecurrenceKind::Weekly => {
        let days = self.week_days.as_deref().unwrap_or_default();
        Recurrence::Weekly { week_days: decode_week_days(days)? }
      }
      RecurrenceKind::SpecificDate => {
        let date = self
          .habit_date
          .as_deref()
          .ok_or_else(|| Error::Decode("specific_date habit without a date".into()))?;
        Recurrence::SpecificDate { date: decode_day(date)? }
      }
    };

    Ok(Habit {
      habit_id:     decode_uuid(&self.habit_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      title:        self.title,
      created_at:   decode_day(&self.created_day)?,
      recurrence,
      activation:   decode_stamp(self.activation_at, self.activation_day)?,
      deactivation: decode_stamp(self.deactivation_at, self.deactivation_day)?,
    })
  }
}

/// Raw strings for a `days` row with its marks concatenated.
pub struct RawDay {
  pub day_id:    String,
  pub user_id:   String,
  pub date:      String,
  pub completed: Option<String>,
}

impl RawDay {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      day_id:    row.get(0)?,
      user_id:   row.get(1)?,
      date:      row.get(2)?,
      completed: row.get(3)?,
    })
  }

  pub fn into_record(self) -> Result<DayRecord> {
    Ok(DayRecord {
      day_id:    decode_uuid(&self.day_id)?,
      user_id:   decode_uuid(&self.user_id)?,
      date:      decode_day(&self.date)?,
      completed: decode_uuid_list(self.completed.as_deref())?,
    })
  }
}

pub struct RawUser {
  pub user_id:    String,
  pub email:      String,
  pub created_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      email:      self.email,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawYear {
  pub year_id:     String,
  pub user_id:     String,
  pub year_number: i32,
}

impl RawYear {
  pub fn into_year(self) -> Result<Year> {
    Ok(Year {
      year_id:     decode_uuid(&self.year_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      year_number: self.year_number,
    })
  }
}

pub struct RawPalette {
  pub color_id: String,
  pub user_id:  String,
  pub colors:   [String; 5],
}

impl RawPalette {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      color_id: row.get(0)?,
      user_id:  row.get(1)?,
      colors:   [row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
    })
  }

  pub fn into_palette(self) -> Result<ColorPalette> {
    Ok(ColorPalette {
      color_id: decode_uuid(&self.color_id)?,
      user_id:  decode_uuid(&self.user_id)?,
      colors:   self.colors,
    })
  }
}

pub struct RawToken {
  pub token_id: String,
  pub user_id:  String,
  pub token:    String,
}

impl RawToken {
  pub fn into_token(self) -> Result<NotificationToken> {
    Ok(NotificationToken {
      token_id: decode_uuid(&self.token_id)?,
      user_id:  decode_uuid(&self.user_id)?,
      token:    self.token,
    })
  }
}
