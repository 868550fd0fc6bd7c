//! Core domain types for the pillsplit system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Parents and custody calendar input
//! - Custody blocks and per-day pill responsibility
//! - Ledger records (prescription fills and distributions)
//! - Derived plans and results handed to presentation layers

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Parents
// ============================================================================

/// Identifier of one of the two custodial parents (e.g. "father", "mother")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Calendar Input and Custody
// ============================================================================

/// A raw custody calendar entry as exported by the calendar collaborator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// One contiguous physical-custody interval for one parent.
///
/// Times are household wall-clock times: the calendar date of `start` and
/// `end` is what the hand-off rule looks at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustodyBlock {
    pub owner: ParentId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Parsed custody calendar for a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustodySchedule {
    pub blocks: Vec<CustodyBlock>,
    /// False when no calendar entry matched any configured parent. All days
    /// then fall to the default parent, which is rarely what the calendar
    /// actually says.
    pub has_custody_data: bool,
}

/// Inclusive range of calendar dates
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting one that ends before it starts
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        if end < start {
            return Err(crate::Error::InsufficientScheduleData(format!(
                "window ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Every date in the window, ascending
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Instant bounds to parse custody events with before classifying this
    /// window.
    ///
    /// The lower bound sits at midnight the day before `start`: a block that
    /// began earlier is clipped there and still credits the morning of
    /// `start`. The upper bound is midnight after `end`.
    pub fn custody_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let before = self.start.pred_opt().unwrap_or(self.start);
        let after = self.end.succ_opt().unwrap_or(self.end);
        (
            before.and_time(chrono::NaiveTime::MIN),
            after.and_time(chrono::NaiveTime::MIN),
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Which parent gives the pill on a given morning
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PillDayAssignment {
    pub date: NaiveDate,
    pub responsible: ParentId,
}

// ============================================================================
// Ledger Records
// ============================================================================

/// A recorded prescription fill
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionFill {
    pub id: Uuid,
    pub fill_date: NaiveDate,
    pub quantity: u32,
    pub pharmacy: Option<String>,
    pub rx_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Pills handed from the holder of a fill to the other parent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Distribution {
    pub id: Uuid,
    pub date: NaiveDate,
    pub quantity: u32,
    pub fill_id: Uuid,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// Derived Results
// ============================================================================

/// Refill eligibility for a fill, evaluated against a given day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefillEligibility {
    pub fill_date: NaiveDate,
    pub eligible_date: NaiveDate,
    /// Negative once the eligible date has passed
    pub days_until: i64,
    pub can_refill: bool,
}

/// The next hand-over of pills to the target parent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionPlan {
    /// First morning the new batch has to cover
    pub pill_day: NaiveDate,
    /// Evening hand-off before `pill_day`
    pub distribution_date: NaiveDate,
    pub quantity: u32,
    /// Supply period the quantity is counted through
    pub supply_window: DateWindow,
    /// Set when the fill this batch depends on cannot be obtained yet
    pub blocked_by: Option<RefillEligibility>,
    /// Target pill days falling before the refill is allowed while blocked
    pub uncovered_pill_days: u32,
}

/// Inventory position of the target parent for one fill
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub pills_remaining_for_target: u32,
    /// Pills of this fill never handed over (still with the holder)
    pub pills_with_holder: u32,
    pub run_out_date: Option<NaiveDate>,
    pub next_distribution: Option<DistributionPlan>,
}
