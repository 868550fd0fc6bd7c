//! Distribution reconciliation.
//!
//! Combines one fill's ledger rows with the pill-day schedule to work out how
//! many pills the target parent still holds, when they run out, and when and
//! how many pills the next hand-over must carry.
//!
//! ## Rules
//!
//! 1. **Ledger checks**: every distribution must draw on this fill, carry a
//!    positive quantity, fall on or after the fill date, and the running total
//!    handed out may never exceed the fill quantity.
//! 2. **Inventory walk**: from the first distribution date, each day first
//!    credits that day's distributions, then consumes one pill if the target
//!    gives that morning's dose.
//! 3. **Run-out**: once every distribution is credited and inventory is zero,
//!    the target runs out the day after the last covered pill day.
//! 4. **Next distribution**: the first target pill day from the run-out date
//!    on; pills change hands at the evening hand-off the day before.
//! 5. **Quantity**: target pill days from that day through the end of the
//!    supply window anchored at the next fill (or the earliest refill date).

use crate::refill::refill_eligibility;
use crate::{
    DateWindow, Distribution, DistributionPlan, Error, ParentId, PillDayAssignment,
    PrescriptionFill, ReconciliationResult, Result,
};
use chrono::{Days, NaiveDate};

/// Everything the reconciler needs besides the ledger rows and the schedule
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcileContext {
    pub today: NaiveDate,
    /// Length of the supply window the next batch is counted through
    pub supply_days: u32,
    pub threshold_percent: f64,
    /// Date of the fill after this one, if it has already happened
    pub next_fill_date: Option<NaiveDate>,
}

/// Reconcile a fill's distributions against the pill-day schedule.
///
/// `assignments` must be in ascending date order (as produced by
/// [`crate::classifier::classify`]) and must start no later than the first
/// distribution. The window is never extended here: when it is too short to
/// answer, the error is [`Error::InsufficientScheduleData`] and the caller
/// retries with a wider one.
pub fn reconcile(
    fill: &PrescriptionFill,
    distributions: &[Distribution],
    assignments: &[PillDayAssignment],
    target: &ParentId,
    ctx: &ReconcileContext,
) -> Result<ReconciliationResult> {
    let (first_day, last_day) = match (assignments.first(), assignments.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => {
            return Err(Error::InsufficientScheduleData(
                "no pill-day assignments supplied".into(),
            ))
        }
    };
    if assignments.windows(2).any(|w| w[0].date >= w[1].date) {
        return Err(Error::Other(
            "pill-day assignments must be in ascending date order".into(),
        ));
    }

    let ordered = check_ledger(fill, distributions)?;
    let handed_out: u32 = ordered.iter().map(|d| d.quantity).sum();
    let pills_with_holder = fill.quantity - handed_out;

    let walk = match ordered.first() {
        Some(first) => {
            if first_day > first.date {
                return Err(Error::InsufficientScheduleData(format!(
                    "schedule starts {} but the first distribution was {}",
                    first_day, first.date
                )));
            }
            walk_inventory(&ordered, assignments, target, ctx.today)
        }
        None => Walk {
            run_out_date: None,
            remaining_today: Some(0),
            ends_empty: true,
        },
    };

    let pills_remaining_for_target = match walk.remaining_today {
        Some(n) => n,
        // Today lies past the schedule; only answerable if nothing is left.
        None if walk.ends_empty => 0,
        None => {
            return Err(Error::InsufficientScheduleData(format!(
                "schedule ends {} before today ({}) and inventory remains",
                last_day, ctx.today
            )))
        }
    };

    let scan_from = if ordered.is_empty() {
        Some(ctx.today.max(fill.fill_date))
    } else {
        walk.run_out_date
    };

    let next_distribution = match scan_from {
        Some(from) => Some(plan_next_distribution(fill, assignments, target, ctx, from)?),
        None => None,
    };

    tracing::debug!(
        "Reconciled fill {}: {} handed out, {} left with {}, run-out {:?}",
        fill.id,
        handed_out,
        pills_remaining_for_target,
        target,
        walk.run_out_date
    );

    Ok(ReconciliationResult {
        pills_remaining_for_target,
        pills_with_holder,
        run_out_date: walk.run_out_date,
        next_distribution,
    })
}

/// Validate the fill's distributions and return them in date order.
fn check_ledger<'a>(
    fill: &PrescriptionFill,
    distributions: &'a [Distribution],
) -> Result<Vec<&'a Distribution>> {
    let mut ordered: Vec<&Distribution> = distributions.iter().collect();
    ordered.sort_by_key(|d| (d.date, d.recorded_at));

    let mut running: u32 = 0;
    for d in &ordered {
        if d.fill_id != fill.id {
            return Err(Error::LedgerInconsistency(format!(
                "distribution {} draws on fill {}, not {}",
                d.id, d.fill_id, fill.id
            )));
        }
        if d.quantity == 0 {
            return Err(Error::LedgerInconsistency(format!(
                "distribution {} on {} has zero quantity",
                d.id, d.date
            )));
        }
        if d.date < fill.fill_date {
            return Err(Error::LedgerInconsistency(format!(
                "distribution {} on {} predates its fill on {}",
                d.id, d.date, fill.fill_date
            )));
        }
        running = running.saturating_add(d.quantity);
        if running > fill.quantity {
            tracing::error!(
                "Distribution {} brings fill {} to {} handed out of {}",
                d.id,
                fill.id,
                running,
                fill.quantity
            );
            return Err(Error::LedgerInconsistency(format!(
                "distribution {} on {} brings the total handed out to {} but the fill held {}",
                d.id, d.date, running, fill.quantity
            )));
        }
    }
    Ok(ordered)
}

struct Walk {
    run_out_date: Option<NaiveDate>,
    /// Inventory after today's dose; None when today is outside the walk
    remaining_today: Option<u32>,
    /// Whether every distribution was credited and fully consumed
    ends_empty: bool,
}

fn walk_inventory(
    ordered: &[&Distribution],
    assignments: &[PillDayAssignment],
    target: &ParentId,
    today: NaiveDate,
) -> Walk {
    let walk_start = ordered[0].date;
    let mut pending = ordered.iter().peekable();
    let mut inventory: u32 = 0;
    let mut last_covered: Option<NaiveDate> = None;
    let mut run_out_date = None;
    let mut remaining_today = if today < walk_start { Some(0) } else { None };

    for assignment in assignments.iter().filter(|a| a.date >= walk_start) {
        while let Some(d) = pending.next_if(|d| d.date <= assignment.date) {
            inventory += d.quantity;
            run_out_date = None;
        }

        if &assignment.responsible == target && inventory > 0 {
            inventory -= 1;
            last_covered = Some(assignment.date);
        }

        if assignment.date == today {
            remaining_today = Some(inventory);
        }

        if inventory == 0 && pending.peek().is_none() && run_out_date.is_none() {
            run_out_date = last_covered.and_then(|d| d.succ_opt());
        }
    }

    Walk {
        run_out_date,
        remaining_today,
        ends_empty: inventory == 0 && pending.peek().is_none(),
    }
}

fn plan_next_distribution(
    fill: &PrescriptionFill,
    assignments: &[PillDayAssignment],
    target: &ParentId,
    ctx: &ReconcileContext,
    from: NaiveDate,
) -> Result<DistributionPlan> {
    let last_day = assignments.last().map(|a| a.date).unwrap_or(from);

    let pill_day = assignments
        .iter()
        .find(|a| a.date >= from && &a.responsible == target)
        .map(|a| a.date)
        .ok_or_else(|| {
            Error::InsufficientScheduleData(format!(
                "no pill day for {} between {} and {}",
                target, from, last_day
            ))
        })?;
    let distribution_date = pill_day.pred_opt().ok_or_else(|| {
        Error::InsufficientScheduleData(format!("no evening before pill day {}", pill_day))
    })?;

    let eligibility = refill_eligibility(
        fill.fill_date,
        fill.quantity,
        ctx.threshold_percent,
        ctx.today,
    )?;
    let anchor = ctx.next_fill_date.unwrap_or(eligibility.eligible_date);

    let supply_window = supply_window_covering(anchor, ctx.supply_days, pill_day)?;
    if last_day < supply_window.end {
        return Err(Error::InsufficientScheduleData(format!(
            "schedule ends {} before the supply window ends {}",
            last_day, supply_window.end
        )));
    }

    let quantity = count_pill_days(assignments, target, pill_day, supply_window.end);

    let blocked_by = if ctx.next_fill_date.is_none() && eligibility.eligible_date > ctx.today {
        Some(eligibility)
    } else {
        None
    };
    let uncovered_pill_days = match &blocked_by {
        Some(e) if e.eligible_date > pill_day => count_pill_days(
            assignments,
            target,
            pill_day,
            e.eligible_date.pred_opt().unwrap_or(pill_day),
        ),
        _ => 0,
    };

    if let Some(e) = &blocked_by {
        tracing::info!(
            "Next distribution on {} waits for refill eligibility on {}",
            distribution_date,
            e.eligible_date
        );
    }

    Ok(DistributionPlan {
        pill_day,
        distribution_date,
        quantity,
        supply_window,
        blocked_by,
        uncovered_pill_days,
    })
}

/// Supply window starting at `anchor`, rolled forward by whole periods until
/// it reaches `pill_day`.
fn supply_window_covering(
    anchor: NaiveDate,
    supply_days: u32,
    pill_day: NaiveDate,
) -> Result<DateWindow> {
    if supply_days == 0 {
        return Err(Error::InvalidSupply("supply days must be positive".into()));
    }
    let out_of_range = || {
        Error::InvalidSupply(format!(
            "supply window of {} days from {} passes the last representable date",
            supply_days, anchor
        ))
    };
    let period = Days::new(u64::from(supply_days));

    let mut start = anchor;
    let mut end = start
        .checked_add_days(Days::new(u64::from(supply_days) - 1))
        .ok_or_else(out_of_range)?;
    while end < pill_day {
        start = start.checked_add_days(period).ok_or_else(out_of_range)?;
        end = end.checked_add_days(period).ok_or_else(out_of_range)?;
    }
    DateWindow::new(start, end)
}

fn count_pill_days(
    assignments: &[PillDayAssignment],
    owner: &ParentId,
    from: NaiveDate,
    through: NaiveDate,
) -> u32 {
    assignments
        .iter()
        .filter(|a| a.date >= from && a.date <= through && &a.responsible == owner)
        .count() as u32
}
