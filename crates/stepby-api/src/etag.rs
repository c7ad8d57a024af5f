//! ETag computation for year summaries.
//!
//! The tag is a SHA-256 over every entry's day id, date and both counts, in
//! the order the summary is served (which is already deterministic).

use sha2::{Digest, Sha256};
use stepby_core::summary::DaySummary;

/// Compute a strong, quoted ETag for `summary`.
pub fn summary_etag(summary: &[DaySummary]) -> String {
  let mut hasher = Sha256::new();
  for entry in summary {
    hasher.update(entry.day_id.as_bytes());
    hasher.update(entry.date.to_string().as_bytes());
    hasher.update(entry.completed_count.to_le_bytes());
    hasher.update(entry.eligible_count.to_le_bytes());
  }
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether an `If-None-Match` header value matches `etag`.
pub fn if_none_match(header: &str, etag: &str) -> bool {
  header
    .split(',')
    .map(|candidate| candidate.trim().trim_start_matches("W/"))
    .any(|candidate| candidate == "*" || candidate == etag)
}
