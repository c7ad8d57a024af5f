//! Per-user reference data: accounts, registered years, color palettes and
//! push notification tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// A year the user has opened in the yearly view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Year {
  pub year_id:     Uuid,
  pub user_id:     Uuid,
  pub year_number: i32,
}

/// The five heat-map colors a user picked, from least to most complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
  pub color_id: Uuid,
  pub user_id:  Uuid,
  pub colors:   [String; 5],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationToken {
  pub token_id: Uuid,
  pub user_id:  Uuid,
  pub token:    String,
}
