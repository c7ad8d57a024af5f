//! Core types and trait definitions for the stepby habit tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the calendar normalizer, the habit eligibility rules, and the day/year
//! aggregations built on top of them. Storage and caching are expressed as
//! traits implemented elsewhere.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod calendar;
pub mod day;
pub mod eligibility;
pub mod error;
pub mod habit;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod user;

pub use error::{Error, Result};
