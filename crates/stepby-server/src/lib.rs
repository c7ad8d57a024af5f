//! Process wiring for the stepby server.
//!
//! Holds the runtime configuration, the Redis-backed summary cache and the
//! scheduled reminder job. The binary in `main.rs` glues these to the API
//! router.

pub mod error;
pub mod redis_cache;
pub mod reminders;

use std::path::PathBuf;

use serde::Deserialize;
use stepby_api::SummaryStrategy;

pub use error::{Error, Result};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `STEPBY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  pub store_path:       PathBuf,
  /// IANA zone every date is normalized in.
  #[serde(default = "default_timezone")]
  pub timezone:         String,
  /// Summaries are cached in process when unset.
  #[serde(default)]
  pub redis_url:        Option<String>,
  #[serde(default)]
  pub summary_strategy: SummaryStrategy,
  #[serde(default)]
  pub notifications:    NotificationConfig,
}

fn default_host() -> String { "0.0.0.0".into() }

fn default_port() -> u16 { 3333 }

fn default_timezone() -> String { "America/Sao_Paulo".into() }

/// Daily push reminder settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
  pub enabled:  bool,
  /// Local times of day, `HH:MM`, in the configured zone.
  pub times:    Vec<String>,
  pub endpoint: String,
  pub title:    String,
  pub body:     String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      enabled:  true,
      times:    vec!["14:00".into(), "20:00".into()],
      endpoint: "https://exp.host/--/api/v2/push/send".into(),
      title:    "Opa!".into(),
      body:     "Não esqueça de preencher seus hábitos diários!".into(),
    }
  }
}
