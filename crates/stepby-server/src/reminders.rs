//! Scheduled push reminders.
//!
//! At each configured local time the job loads every registered push token,
//! drops duplicates and posts one message per token to the push endpoint.
//! Delivery failures are logged and never stop the schedule.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Days, NaiveTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use stepby_core::{calendar::Calendar, store::HabitStore, user::NotificationToken};

use crate::{Error, NotificationConfig, Result};

/// Body of one push request.
#[derive(Debug, Serialize)]
pub struct PushMessage<'a> {
  pub to:    &'a str,
  pub title: &'a str,
  pub body:  &'a str,
}

pub fn parse_times(times: &[String]) -> Result<Vec<NaiveTime>> {
  let mut parsed = times
    .iter()
    .map(|t| {
      NaiveTime::parse_from_str(t.trim(), "%H:%M")
        .map_err(|_| Error::InvalidReminderTime(t.clone()))
    })
    .collect::<Result<Vec<_>>>()?;
  parsed.sort();
  parsed.dedup();
  Ok(parsed)
}

/// The first instant strictly after `now` that falls on one of `times` in
/// zone `tz`. Local times skipped by a DST gap are passed over.
pub fn next_fire(now: DateTime<Utc>, tz: Tz, times: &[NaiveTime]) -> Option<DateTime<Utc>> {
  let today = now.with_timezone(&tz).date_naive();
  (0..=2)
    .filter_map(|offset| today.checked_add_days(Days::new(offset)))
    .flat_map(|date| times.iter().map(move |t| date.and_time(*t)))
    .filter_map(|local| tz.from_local_datetime(&local).earliest())
    .map(|at| at.with_timezone(&Utc))
    .filter(|at| *at > now)
    .min()
}

/// Token strings with duplicates removed, first occurrence first.
pub fn unique_tokens(tokens: &[NotificationToken]) -> Vec<&str> {
  let mut seen = HashSet::new();
  tokens
    .iter()
    .map(|t| t.token.as_str())
    .filter(|t| seen.insert(*t))
    .collect()
}

// ─── Job ─────────────────────────────────────────────────────────────────────

pub struct Reminders<S> {
  store:  Arc<S>,
  client: reqwest::Client,
  tz:     Tz,
  times:  Vec<NaiveTime>,
  config: NotificationConfig,
}

impl<S: HabitStore + 'static> Reminders<S> {
  pub fn new(store: Arc<S>, calendar: Calendar, config: NotificationConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      store,
      client,
      tz: calendar.timezone(),
      times: parse_times(&config.times)?,
      config,
    })
  }

  /// Send one reminder to every distinct token. Returns how many pushes the
  /// endpoint accepted.
  pub async fn send_all(&self) -> Result<usize> {
    let tokens = self
      .store
      .list_tokens()
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    let mut delivered = 0;
    for token in unique_tokens(&tokens) {
      let message = PushMessage { to: token, title: &self.config.title, body: &self.config.body };
      let result = self
        .client
        .post(&self.config.endpoint)
        .json(&message)
        .send()
        .await
        .and_then(|resp| resp.error_for_status());
      match result {
        Ok(_) => delivered += 1,
        Err(e) => tracing::warn!(error = %e, "push reminder failed"),
      }
    }
    Ok(delivered)
  }

  /// Run forever, firing at each configured time.
  pub async fn run(self) {
    loop {
      let now = Utc::now();
      let Some(next) = next_fire(now, self.tz, &self.times) else {
        tracing::warn!("no reminder times configured, stopping reminders");
        return;
      };
      tracing::debug!(%next, "next push reminder");
      tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

      match self.send_all().await {
        Ok(delivered) => tracing::info!(delivered, "push reminders sent"),
        Err(e) => tracing::warn!(error = %e, "push reminders skipped"),
      }
    }
  }

  pub fn spawn(self) -> tokio::task::JoinHandle<()> { tokio::spawn(self.run()) }
}
