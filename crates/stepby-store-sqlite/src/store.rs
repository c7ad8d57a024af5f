//! [`SqliteStore`]: the SQLite implementation of [`HabitStore`].

use std::path::Path;

use chrono::{SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use stepby_core::{
  calendar::CalendarDay,
  day::{CompletionToggle, DayRecord, ToggleOutcome},
  habit::{Habit, HabitEdit, LifecycleEvent, NewHabit, Recurrence},
  store::HabitStore,
  summary::DaySummary,
  user::{ColorPalette, NotificationToken, User, Year},
};

use crate::{
  Error, Result,
  encode::{
    HABIT_COLUMNS, RawDay, RawHabit, RawPalette, RawToken, RawUser, RawYear,
    decode_day, decode_uuid, encode_day, encode_dt, encode_stamp, encode_uuid,
  },
  schema::{ELIGIBLE_ON_DAY, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A habit store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_habit(&self, habit_id: Uuid) -> Result<Option<Habit>> {
    let id_str = encode_uuid(habit_id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_habit(conn, &id_str)?))
      .await?;
    raw.map(RawHabit::into_habit).transpose()
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn select_habit(
  conn: &rusqlite::Connection,
  habit_id: &str,
) -> rusqlite::Result<Option<RawHabit>> {
  conn
    .query_row(
      &format!("SELECT {HABIT_COLUMNS} FROM habits h WHERE h.habit_id = ?1"),
      rusqlite::params![habit_id],
      RawHabit::from_row,
    )
    .optional()
}

fn insert_week_days(
  conn: &rusqlite::Connection,
  habit_id: &str,
  recurrence: &Recurrence,
) -> rusqlite::Result<()> {
  if let Recurrence::Weekly { week_days } = recurrence {
    let mut stmt =
      conn.prepare("INSERT INTO habit_week_days (habit_id, week_day) VALUES (?1, ?2)")?;
    for day in week_days.iter() {
      stmt.execute(rusqlite::params![habit_id, day])?;
    }
  }
  Ok(())
}

fn fixed_date(recurrence: &Recurrence) -> Option<String> {
  match recurrence {
    Recurrence::SpecificDate { date } => Some(encode_day(*date)),
    Recurrence::Weekly { .. } => None,
  }
}

fn year_range(year: i32) -> (String, String) {
  // Four-digit years only (validated upstream), so string bounds are safe.
  (format!("{year:04}-01-01"), format!("{year:04}-12-31"))
}

// ─── HabitStore impl ─────────────────────────────────────────────────────────

impl HabitStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, email: String) -> Result<User> {
    // Stored at microsecond precision; keep the returned value identical.
    let created_at = Utc::now().trunc_subsecs(6);
    let user = User { user_id: Uuid::new_v4(), email, created_at };

    let id_str = encode_uuid(user.user_id);
    let email  = user.email.clone();
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, email, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, email, created_at FROM users WHERE email = ?1",
            rusqlite::params![email],
            |row| {
              Ok(RawUser {
                user_id:    row.get(0)?,
                email:      row.get(1)?,
                created_at: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Notification tokens ───────────────────────────────────────────────────

  async fn add_token(&self, user_id: Uuid, token: String) -> Result<NotificationToken> {
    let created = NotificationToken { token_id: Uuid::new_v4(), user_id, token };

    let id_str   = encode_uuid(created.token_id);
    let user_str = encode_uuid(user_id);
    let token    = created.token.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_tokens (token_id, user_id, token) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, user_str, token],
        )?;
        Ok(())
      })
      .await?;

    Ok(created)
  }

  async fn find_token(&self, token: String) -> Result<Option<NotificationToken>> {
    let raw: Option<RawToken> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token_id, user_id, token FROM notification_tokens
             WHERE token = ?1 ORDER BY rowid LIMIT 1",
            rusqlite::params![token],
            |row| {
              Ok(RawToken {
                token_id: row.get(0)?,
                user_id:  row.get(1)?,
                token:    row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawToken::into_token).transpose()
  }

  async fn list_tokens(&self) -> Result<Vec<NotificationToken>> {
    let raws: Vec<RawToken> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT token_id, user_id, token FROM notification_tokens ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawToken {
              token_id: row.get(0)?,
              user_id:  row.get(1)?,
              token:    row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawToken::into_token).collect()
  }

  // ── Years ─────────────────────────────────────────────────────────────────

  async fn list_years(&self, user_id: Uuid) -> Result<Vec<Year>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawYear> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT year_id, user_id, year_number FROM years
           WHERE user_id = ?1 ORDER BY year_number ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |row| {
            Ok(RawYear {
              year_id:     row.get(0)?,
              user_id:     row.get(1)?,
              year_number: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawYear::into_year).collect()
  }

  async fn find_year(&self, user_id: Uuid, year_number: i32) -> Result<Option<Year>> {
    let user_str = encode_uuid(user_id);

    let raw: Option<RawYear> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT year_id, user_id, year_number FROM years
             WHERE user_id = ?1 AND year_number = ?2",
            rusqlite::params![user_str, year_number],
            |row| {
              Ok(RawYear {
                year_id:     row.get(0)?,
                user_id:     row.get(1)?,
                year_number: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawYear::into_year).transpose()
  }

  async fn add_year(&self, user_id: Uuid, year_number: i32) -> Result<Year> {
    let year = Year { year_id: Uuid::new_v4(), user_id, year_number };

    let id_str   = encode_uuid(year.year_id);
    let user_str = encode_uuid(user_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO years (year_id, user_id, year_number) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, user_str, year_number],
        )?;
        Ok(())
      })
      .await?;

    Ok(year)
  }

  // ── Color palettes ────────────────────────────────────────────────────────

  async fn add_palette(&self, user_id: Uuid, colors: [String; 5]) -> Result<ColorPalette> {
    let palette = ColorPalette { color_id: Uuid::new_v4(), user_id, colors };

    let id_str   = encode_uuid(palette.color_id);
    let user_str = encode_uuid(user_id);
    let [c1, c2, c3, c4, c5] = palette.colors.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO colors (color_id, user_id, color_1, color_2, color_3, color_4, color_5)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, user_str, c1, c2, c3, c4, c5],
        )?;
        Ok(())
      })
      .await?;

    Ok(palette)
  }

  async fn palette_for_user(&self, user_id: Uuid) -> Result<Option<ColorPalette>> {
    let user_str = encode_uuid(user_id);

    let raw: Option<RawPalette> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT color_id, user_id, color_1, color_2, color_3, color_4, color_5
             FROM colors WHERE user_id = ?1 ORDER BY rowid LIMIT 1",
            rusqlite::params![user_str],
            RawPalette::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPalette::into_palette).transpose()
  }

  async fn update_palette(
    &self,
    color_id: Uuid,
    colors:   [String; 5],
  ) -> Result<Option<ColorPalette>> {
    let id_str = encode_uuid(color_id);
    let [c1, c2, c3, c4, c5] = colors;

    let raw: Option<RawPalette> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE colors SET color_1 = ?2, color_2 = ?3, color_3 = ?4, color_4 = ?5, color_5 = ?6
           WHERE color_id = ?1",
          rusqlite::params![id_str, c1, c2, c3, c4, c5],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(conn
          .query_row(
            "SELECT color_id, user_id, color_1, color_2, color_3, color_4, color_5
             FROM colors WHERE color_id = ?1",
            rusqlite::params![id_str],
            RawPalette::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPalette::into_palette).transpose()
  }

  // ── Habits ────────────────────────────────────────────────────────────────

  async fn add_habit(&self, input: NewHabit) -> Result<Habit> {
    let habit = Habit {
      habit_id:     Uuid::new_v4(),
      user_id:      input.user_id,
      title:        input.title,
      created_at:   input.created_at,
      recurrence:   input.recurrence,
      activation:   None,
      deactivation: None,
    };

    let id_str      = encode_uuid(habit.habit_id);
    let user_str    = encode_uuid(habit.user_id);
    let title       = habit.title.clone();
    let created_str = encode_day(habit.created_at);
    let kind_str    = habit.recurrence.kind().to_string();
    let date_str    = fixed_date(&habit.recurrence);
    let recurrence  = habit.recurrence;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO habits (habit_id, user_id, title, created_day, kind, habit_date)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, user_str, title, created_str, kind_str, date_str],
        )?;
        insert_week_days(&tx, &id_str, &recurrence)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(habit)
  }

  async fn get_habit(&self, habit_id: Uuid) -> Result<Option<Habit>> {
    self.fetch_habit(habit_id).await
  }

  async fn list_habits(&self, user_id: Uuid) -> Result<Vec<Habit>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawHabit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HABIT_COLUMNS} FROM habits h
           WHERE h.user_id = ?1
           ORDER BY h.created_day ASC, h.habit_id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawHabit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHabit::into_habit).collect()
  }

  async fn list_habits_until(&self, user_id: Uuid, until: CalendarDay) -> Result<Vec<Habit>> {
    let user_str  = encode_uuid(user_id);
    let until_str = encode_day(until);

    let raws: Vec<RawHabit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HABIT_COLUMNS} FROM habits h
           WHERE h.user_id = ?1 AND h.created_day <= ?2
           ORDER BY h.created_day ASC, h.habit_id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, until_str], RawHabit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHabit::into_habit).collect()
  }

  async fn update_habit(&self, habit_id: Uuid, edit: HabitEdit) -> Result<Option<Habit>> {
    let id_str     = encode_uuid(habit_id);
    let kind_str   = edit.recurrence.kind().to_string();
    let date_str   = fixed_date(&edit.recurrence);
    let recurrence = edit.recurrence;
    let title      = edit.title;

    let raw: Option<RawHabit> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE habits SET title = ?2, kind = ?3, habit_date = ?4 WHERE habit_id = ?1",
          rusqlite::params![id_str, title, kind_str, date_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        tx.execute(
          "DELETE FROM habit_week_days WHERE habit_id = ?1",
          rusqlite::params![id_str],
        )?;
        insert_week_days(&tx, &id_str, &recurrence)?;
        let raw = select_habit(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawHabit::into_habit).transpose()
  }

  async fn record_lifecycle(
    &self,
    habit_id: Uuid,
    event:    LifecycleEvent,
  ) -> Result<Option<Habit>> {
    let id_str = encode_uuid(habit_id);
    let (sql, stamp) = match &event {
      LifecycleEvent::Deactivated(stamp) => (
        "UPDATE habits SET deactivation_at = ?2, deactivation_day = ?3 WHERE habit_id = ?1",
        stamp,
      ),
      LifecycleEvent::Reactivated(stamp) => (
        "UPDATE habits SET activation_at = ?2, activation_day = ?3 WHERE habit_id = ?1",
        stamp,
      ),
    };
    let (at_str, day_str) = encode_stamp(stamp);

    let raw: Option<RawHabit> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(sql, rusqlite::params![id_str, at_str, day_str])?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_habit(conn, &id_str)?)
      })
      .await?;

    raw.map(RawHabit::into_habit).transpose()
  }

  async fn delete_habit(&self, habit_id: Uuid) -> Result<Option<Habit>> {
    let id_str = encode_uuid(habit_id);

    let raw: Option<RawHabit> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = select_habit(&tx, &id_str)?;
        if raw.is_some() {
          // Week days and completion marks go with it via ON DELETE CASCADE.
          tx.execute("DELETE FROM habits WHERE habit_id = ?1", rusqlite::params![id_str])?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawHabit::into_habit).transpose()
  }

  // ── Days & completions ────────────────────────────────────────────────────

  async fn get_day(&self, user_id: Uuid, date: CalendarDay) -> Result<Option<DayRecord>> {
    let user_str = encode_uuid(user_id);
    let date_str = encode_day(date);

    let raw: Option<RawDay> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT d.day_id, d.user_id, d.date, group_concat(dh.habit_id)
             FROM days d
             LEFT JOIN day_habits dh ON dh.day_id = d.day_id
             WHERE d.user_id = ?1 AND d.date = ?2
             GROUP BY d.day_id",
            rusqlite::params![user_str, date_str],
            RawDay::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDay::into_record).transpose()
  }

  async fn list_days(&self, user_id: Uuid, year: i32) -> Result<Vec<DayRecord>> {
    let user_str   = encode_uuid(user_id);
    let (from, to) = year_range(year);

    let raws: Vec<RawDay> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.day_id, d.user_id, d.date, group_concat(dh.habit_id)
           FROM days d
           LEFT JOIN day_habits dh ON dh.day_id = d.day_id
           WHERE d.user_id = ?1 AND d.date BETWEEN ?2 AND ?3
           GROUP BY d.day_id
           ORDER BY d.date ASC, d.day_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, from, to], RawDay::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDay::into_record).collect()
  }

  async fn day_years(&self, user_id: Uuid) -> Result<Vec<i32>> {
    let user_str = encode_uuid(user_id);

    let years: Vec<i32> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT CAST(substr(date, 1, 4) AS INTEGER) AS y
           FROM days WHERE user_id = ?1 ORDER BY y ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(years)
  }

  async fn toggle_completion(
    &self,
    user_id:  Uuid,
    habit_id: Uuid,
    date:     CalendarDay,
  ) -> Result<CompletionToggle> {
    let user_str     = encode_uuid(user_id);
    let habit_str    = encode_uuid(habit_id);
    let date_str     = encode_day(date);
    let new_day_str  = encode_uuid(Uuid::new_v4());
    let new_mark_str = encode_uuid(Uuid::new_v4());

    let (day_id_str, outcome): (String, ToggleOutcome) = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the find-or-create and
        // the delete-or-insert below see a consistent view.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
          "INSERT INTO days (day_id, user_id, date) VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id, date) DO NOTHING",
          rusqlite::params![new_day_str, user_str, date_str],
        )?;
        let day_id: String = tx.query_row(
          "SELECT day_id FROM days WHERE user_id = ?1 AND date = ?2",
          rusqlite::params![user_str, date_str],
          |row| row.get(0),
        )?;

        let removed = tx.execute(
          "DELETE FROM day_habits WHERE day_id = ?1 AND habit_id = ?2",
          rusqlite::params![day_id, habit_str],
        )?;
        let outcome = if removed > 0 {
          ToggleOutcome::Unmarked
        } else {
          tx.execute(
            "INSERT INTO day_habits (day_habit_id, day_id, habit_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![new_mark_str, day_id, habit_str],
          )?;
          ToggleOutcome::Marked
        };

        tx.commit()?;
        Ok((day_id, outcome))
      })
      .await?;

    tracing::debug!(%user_id, %habit_id, %date, ?outcome, "completion toggled");

    Ok(CompletionToggle {
      day_id: decode_uuid(&day_id_str)?,
      habit_id,
      date,
      outcome,
    })
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  async fn year_summary(&self, user_id: Uuid, year: i32) -> Result<Vec<DaySummary>> {
    let user_str   = encode_uuid(user_id);
    let (from, to) = year_range(year);

    let rows: Vec<(String, String, f64, f64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT
             d.day_id,
             d.date,
             (SELECT CAST(count(*) AS REAL)
                FROM day_habits dh
                JOIN habits h ON h.habit_id = dh.habit_id
               WHERE dh.day_id = d.day_id
                 AND {ELIGIBLE_ON_DAY}) AS completed_count,
             (SELECT CAST(count(*) AS REAL)
                FROM habits h
               WHERE h.user_id = d.user_id
                 AND {ELIGIBLE_ON_DAY}) AS eligible_count
           FROM days d
           WHERE d.user_id = ?1 AND d.date BETWEEN ?2 AND ?3
           ORDER BY d.date ASC, d.day_id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, from, to], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(day_id, date, completed_count, eligible_count)| {
        Ok(DaySummary {
          day_id: decode_uuid(&day_id)?,
          date: decode_day(&date)?,
          completed_count,
          eligible_count,
        })
      })
      .collect()
  }
}
