#![forbid(unsafe_code)]

//! Core domain model and business logic for pillsplit, a medication
//! distribution planner for a child living across two households.
//!
//! This crate provides:
//! - Domain types (parents, custody blocks, fills, distributions)
//! - Custody parsing and pill-day classification
//! - Refill eligibility and inventory reconciliation
//! - Status snapshots and calendar reminders
//! - Persistence (JSONL ledger, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod custody;
pub mod classifier;
pub mod refill;
pub mod reconcile;
pub mod status;
pub mod reminders;
pub mod ledger;
pub mod calendar;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, Household, RefillPolicy};
pub use custody::{parse_custody_blocks, ParentMatchers};
pub use classifier::{classify, next_pill_day, tally, PillDayTally};
pub use refill::{earliest_refill_date, refill_eligibility};
pub use reconcile::{reconcile, ReconcileContext};
pub use status::{build_status, StatusInput, StatusSnapshot};
pub use reminders::{plan_reminders, ReminderEvent, ReminderKind};
pub use ledger::{Ledger, NewDistribution, NewFill};
pub use calendar::load_custody_events;
pub use export::export_distributions;
