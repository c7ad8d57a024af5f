//! SQL schema for the stepby SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_tokens (
    token_id    TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    token       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS years (
    year_id     TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    year_number INTEGER NOT NULL,
    UNIQUE (user_id, year_number)
);

CREATE TABLE IF NOT EXISTS colors (
    color_id    TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    color_1     TEXT NOT NULL,
    color_2     TEXT NOT NULL,
    color_3     TEXT NOT NULL,
    color_4     TEXT NOT NULL,
    color_5     TEXT NOT NULL
);

-- Every *_day column is a normalized calendar day (YYYY-MM-DD) so date
-- comparisons are plain string comparisons. *_at columns are fixed-width
-- RFC 3339 UTC instants and only order lifecycle events against each other.
CREATE TABLE IF NOT EXISTS habits (
    habit_id         TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    title            TEXT NOT NULL,
    created_day      TEXT NOT NULL,
    kind             TEXT NOT NULL,   -- 'weekly' | 'specific_date'
    habit_date       TEXT,            -- set iff kind = 'specific_date'
    activation_at    TEXT,
    activation_day   TEXT,
    deactivation_at  TEXT,
    deactivation_day TEXT,
    CHECK (kind IN ('weekly', 'specific_date')),
    CHECK ((kind = 'specific_date') = (habit_date IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS habit_week_days (
    habit_id    TEXT NOT NULL REFERENCES habits(habit_id) ON DELETE CASCADE,
    week_day    INTEGER NOT NULL CHECK (week_day BETWEEN 0 AND 6),
    PRIMARY KEY (habit_id, week_day)
);

CREATE TABLE IF NOT EXISTS days (
    day_id      TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    date        TEXT NOT NULL,
    UNIQUE (user_id, date)
);

-- One row per completed (day, habit).
CREATE TABLE IF NOT EXISTS day_habits (
    day_habit_id TEXT PRIMARY KEY,
    day_id       TEXT NOT NULL REFERENCES days(day_id) ON DELETE CASCADE,
    habit_id     TEXT NOT NULL REFERENCES habits(habit_id) ON DELETE CASCADE,
    UNIQUE (day_id, habit_id)
);

CREATE INDEX IF NOT EXISTS habits_user_idx     ON habits(user_id, created_day);
CREATE INDEX IF NOT EXISTS day_habits_habit_idx ON day_habits(habit_id);
CREATE INDEX IF NOT EXISTS tokens_token_idx    ON notification_tokens(token);

PRAGMA user_version = 1;
";

/// `1` when habit `h` is eligible on day `d.date`, mirroring
/// `stepby_core::eligibility::is_eligible`. Expects the aliases `h` (habits)
/// and `d` (days) to be in scope.
pub const ELIGIBLE_ON_DAY: &str = "
    h.created_day <= d.date
    AND (
      (h.kind = 'weekly' AND EXISTS (
         SELECT 1 FROM habit_week_days w
         WHERE w.habit_id = h.habit_id
           AND w.week_day = CAST(strftime('%w', d.date) AS INTEGER)))
      OR (h.kind = 'specific_date' AND h.habit_date = d.date)
    )
    AND (
      h.deactivation_at IS NULL
      OR h.deactivation_day > d.date
      OR (h.activation_at IS NOT NULL
          AND h.deactivation_at < h.activation_at
          AND h.activation_day <= d.date)
      OR (h.kind = 'specific_date' AND h.habit_date = d.date)
    )
";
