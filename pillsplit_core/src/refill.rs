//! Refill eligibility under the insurer's percentage-of-supply rule.
//!
//! A controlled-substance fill may be renewed once `threshold_percent` of its
//! day supply has elapsed. Partial days are truncated, never rounded up, so
//! the computed date is never earlier than the insurer allows.

use crate::{Error, RefillEligibility, Result};
use chrono::{Days, NaiveDate};

/// Earliest date a fill may be refilled.
///
/// `fill_date + floor(supply_days * threshold_percent / 100)` days.
pub fn earliest_refill_date(
    fill_date: NaiveDate,
    supply_days: u32,
    threshold_percent: f64,
) -> Result<NaiveDate> {
    if supply_days == 0 {
        return Err(Error::InvalidSupply("supply days must be positive".into()));
    }
    if !(threshold_percent.is_finite() && threshold_percent > 0.0) {
        return Err(Error::InvalidSupply(format!(
            "refill threshold must be a positive percentage, got {}",
            threshold_percent
        )));
    }

    let out_of_range = || {
        Error::InvalidSupply(format!(
            "{}% of {} days from {} is not a representable date",
            threshold_percent, supply_days, fill_date
        ))
    };

    let elapsed_days = (f64::from(supply_days) * threshold_percent / 100.0).floor();
    if elapsed_days > f64::from(u32::MAX) {
        return Err(out_of_range());
    }
    fill_date
        .checked_add_days(Days::new(elapsed_days as u64))
        .ok_or_else(out_of_range)
}

/// Refill eligibility of a fill as seen on `today`
pub fn refill_eligibility(
    fill_date: NaiveDate,
    supply_days: u32,
    threshold_percent: f64,
    today: NaiveDate,
) -> Result<RefillEligibility> {
    let eligible_date = earliest_refill_date(fill_date, supply_days, threshold_percent)?;
    Ok(RefillEligibility {
        fill_date,
        eligible_date,
        days_until: (eligible_date - today).num_days(),
        can_refill: today >= eligible_date,
    })
}
