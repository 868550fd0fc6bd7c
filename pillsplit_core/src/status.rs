//! Status snapshot for presentation layers.
//!
//! Composes custody parsing, classification, refill eligibility and
//! reconciliation for the latest fill into one read-only value. A first run
//! with an empty ledger yields a snapshot whose sections are all `None`.

use crate::classifier::{classify, tally, PillDayTally};
use crate::config::{Household, RefillPolicy};
use crate::custody::parse_custody_blocks;
use crate::reconcile::{reconcile, ReconcileContext};
use crate::refill::refill_eligibility;
use crate::{
    DateWindow, Distribution, DistributionPlan, Error, ParentId, PillDayAssignment,
    PrescriptionFill, RawEvent, RefillEligibility, Result,
};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

/// How many times the schedule window is widened before giving up
const MAX_WIDENINGS: u32 = 4;

/// Everything a snapshot is computed from
#[derive(Clone, Copy, Debug)]
pub struct StatusInput<'a> {
    pub latest_fill: Option<&'a PrescriptionFill>,
    /// Distributions drawing on `latest_fill`
    pub distributions: &'a [Distribution],
    pub events: &'a [RawEvent],
    pub household: &'a Household,
    pub policy: &'a RefillPolicy,
    pub today: NaiveDate,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FillSummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub quantity: u32,
    pub pharmacy: Option<String>,
    pub rx_number: Option<String>,
    pub days_ago: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LastDistribution {
    pub date: NaiveDate,
    pub quantity: u32,
    pub days_ago: i64,
}

/// The target parent's position for the latest fill
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TargetInventory {
    pub target: ParentId,
    pub holder: ParentId,
    pub last_distribution: Option<LastDistribution>,
    pub total_distributed: u32,
    pub pills_remaining: u32,
    pub pills_with_holder: u32,
    pub run_out_date: Option<NaiveDate>,
    pub days_until_run_out: Option<i64>,
    pub is_out: bool,
}

/// Pill days per parent over one supply period
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Breakdown {
    pub window: DateWindow,
    pub tally: PillDayTally,
}

/// Combined view for the CLI
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StatusSnapshot {
    pub today: NaiveDate,
    pub has_custody_data: bool,
    pub fill: Option<FillSummary>,
    pub refill: Option<RefillEligibility>,
    pub inventory: Option<TargetInventory>,
    pub next_distribution: Option<DistributionPlan>,
    pub breakdown: Option<Breakdown>,
}

impl StatusSnapshot {
    fn empty(today: NaiveDate) -> Self {
        Self {
            today,
            has_custody_data: false,
            fill: None,
            refill: None,
            inventory: None,
            next_distribution: None,
            breakdown: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.fill.is_some()
    }
}

/// Build the status snapshot.
///
/// Either the whole snapshot is returned or the first error; nothing partial.
pub fn build_status(input: StatusInput<'_>) -> Result<StatusSnapshot> {
    let Some(fill) = input.latest_fill else {
        tracing::info!("No prescription fill recorded yet");
        return Ok(StatusSnapshot::empty(input.today));
    };
    let today = input.today;
    let policy = input.policy;
    let household = input.household;

    let refill = refill_eligibility(fill.fill_date, fill.quantity, policy.threshold_percent, today)?;

    let start = input
        .distributions
        .iter()
        .map(|d| d.date)
        .chain([fill.fill_date, today])
        .min()
        .unwrap_or(today);
    let base_end = days_after(
        today.max(refill.eligible_date),
        u64::from(policy.supply_days) + u64::from(policy.lookahead_days),
    )?;

    let ctx = ReconcileContext {
        today,
        supply_days: policy.supply_days,
        threshold_percent: policy.threshold_percent,
        next_fill_date: None,
    };

    // Widen until the schedule answers: a recoverable error, or stock that
    // outlasts the window, both mean the window was too short.
    let mut end = base_end;
    let mut extra_days = u64::from(policy.lookahead_days.max(1));
    let mut attempt = 0;
    let (has_custody_data, reconciliation) = loop {
        let window = DateWindow::new(start, end)?;
        let (has_custody_data, assignments) = pill_days(input.events, household, window)?;
        let can_widen = attempt < MAX_WIDENINGS;

        match reconcile(fill, input.distributions, &assignments, &household.target, &ctx) {
            Ok(result)
                if result.run_out_date.is_none()
                    && !input.distributions.is_empty()
                    && can_widen =>
            {
                tracing::debug!("Stock outlasts schedule ending {}, widening", window.end);
            }
            Ok(result) => break (has_custody_data, result),
            Err(e) if e.is_recoverable() && can_widen => {
                tracing::debug!("Widening schedule past {}: {}", window.end, e);
            }
            Err(e) => return Err(e),
        }

        attempt += 1;
        end = days_after(end, extra_days)?;
        extra_days = extra_days.saturating_mul(2);
    };

    if !has_custody_data {
        tracing::warn!(
            "No custody entries matched; every day was assigned to {}",
            household.default_owner
        );
    }

    let breakdown = {
        let period_start = if reconciliation.pills_with_holder > 0 {
            fill.fill_date
        } else {
            refill.eligible_date
        };
        let window = DateWindow::new(
            period_start,
            days_after(period_start, u64::from(policy.supply_days).saturating_sub(1))?,
        )?;
        let (_, assignments) = pill_days(input.events, household, window)?;
        Breakdown {
            window,
            tally: tally(&assignments),
        }
    };

    let last_distribution = input
        .distributions
        .iter()
        .max_by_key(|d| (d.date, d.recorded_at))
        .map(|d| LastDistribution {
            date: d.date,
            quantity: d.quantity,
            days_ago: (today - d.date).num_days(),
        });

    let inventory = TargetInventory {
        target: household.target.clone(),
        holder: household.holder.clone(),
        last_distribution,
        total_distributed: input.distributions.iter().map(|d| d.quantity).sum(),
        pills_remaining: reconciliation.pills_remaining_for_target,
        pills_with_holder: reconciliation.pills_with_holder,
        run_out_date: reconciliation.run_out_date,
        days_until_run_out: reconciliation
            .run_out_date
            .map(|d| (d - today).num_days()),
        is_out: reconciliation.run_out_date.is_some_and(|d| today >= d),
    };

    Ok(StatusSnapshot {
        today,
        has_custody_data,
        fill: Some(FillSummary {
            id: fill.id,
            date: fill.fill_date,
            quantity: fill.quantity,
            pharmacy: fill.pharmacy.clone(),
            rx_number: fill.rx_number.clone(),
            days_ago: (today - fill.fill_date).num_days(),
        }),
        refill: Some(refill),
        inventory: Some(inventory),
        next_distribution: reconciliation.next_distribution,
        breakdown: Some(breakdown),
    })
}

/// `date` plus `days`, or `InvalidSupply` past the last representable date
fn days_after(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days)).ok_or_else(|| {
        Error::InvalidSupply(format!(
            "{} days after {} is not a representable date",
            days, date
        ))
    })
}

/// Parse and classify custody for a date window.
///
/// Returns whether any calendar entry matched alongside the assignments.
pub fn pill_days(
    events: &[RawEvent],
    household: &Household,
    window: DateWindow,
) -> Result<(bool, Vec<PillDayAssignment>)> {
    let (from, to) = window.custody_bounds();
    let schedule = parse_custody_blocks(events, &household.matchers, from, to)?;
    let assignments = classify(&schedule.blocks, &household.default_owner, window)?;
    Ok((schedule.has_custody_data, assignments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use chrono::{DateTime, Utc};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn household() -> Household {
        let config: Config = toml::from_str(
            r#"
[household]
parents = [{ id = "father", matcher = "Brian" }, { id = "mother" }]
default_parent = "mother"
target_parent = "mother"
"#,
        )
        .unwrap();
        config.household().unwrap()
    }

    fn policy() -> RefillPolicy {
        RefillPolicy {
            supply_days: 30,
            threshold_percent: 85.0,
            lookahead_days: 14,
        }
    }

    fn event(title: &str, start: &str, end: &str) -> RawEvent {
        RawEvent {
            title: title.into(),
            start: DateTime::parse_from_rfc3339(start).unwrap(),
            end: DateTime::parse_from_rfc3339(end).unwrap(),
        }
    }

    fn fill() -> PrescriptionFill {
        PrescriptionFill {
            id: Uuid::new_v4(),
            fill_date: date("2025-10-08"),
            quantity: 30,
            pharmacy: Some("Walgreens".into()),
            rx_number: Some("RX-1".into()),
            notes: None,
            recorded_at: Utc::now(),
        }
    }

    fn events() -> Vec<RawEvent> {
        vec![event(
            "Brian",
            "2025-10-28T17:00:00-04:00",
            "2025-10-31T17:00:00-04:00",
        )]
    }

    #[test]
    fn test_first_run_has_no_data() {
        let household = household();
        let policy = policy();
        let snapshot = build_status(StatusInput {
            latest_fill: None,
            distributions: &[],
            events: &[],
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        })
        .unwrap();

        assert!(!snapshot.has_data());
        assert!(snapshot.refill.is_none());
        assert!(snapshot.inventory.is_none());
        assert!(snapshot.next_distribution.is_none());
    }

    #[test]
    fn test_full_snapshot() {
        crate::logging::init_test();
        let household = household();
        let policy = policy();
        let fill = fill();
        let dists = vec![Distribution {
            id: Uuid::new_v4(),
            date: date("2025-10-13"),
            quantity: 16,
            fill_id: fill.id,
            notes: None,
            recorded_at: Utc::now(),
        }];
        let events = events();

        let snapshot = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &dists,
            events: &events,
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        })
        .unwrap();

        assert!(snapshot.has_custody_data);
        assert_eq!(snapshot.fill.as_ref().unwrap().days_ago, 12);

        let refill = snapshot.refill.as_ref().unwrap();
        assert_eq!(refill.eligible_date, date("2025-11-02"));
        assert!(!refill.can_refill);

        let inventory = snapshot.inventory.as_ref().unwrap();
        assert_eq!(inventory.run_out_date, Some(date("2025-10-29")));
        assert_eq!(inventory.days_until_run_out, Some(9));
        assert_eq!(inventory.pills_remaining, 8);
        assert_eq!(inventory.pills_with_holder, 14);
        assert!(!inventory.is_out);

        let plan = snapshot.next_distribution.as_ref().unwrap();
        assert_eq!(plan.distribution_date, date("2025-10-31"));
        assert_eq!(plan.quantity, 31);

        let breakdown = snapshot.breakdown.as_ref().unwrap();
        assert_eq!(breakdown.window.start, date("2025-10-08"));
        assert_eq!(breakdown.tally.count(&ParentId::new("father")), 3);
        assert_eq!(breakdown.tally.count(&ParentId::new("mother")), 27);
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let household = household();
        let policy = policy();
        let fill = fill();
        let events = events();
        let input = StatusInput {
            latest_fill: Some(&fill),
            distributions: &[],
            events: &events,
            household: &household,
            policy: &policy,
            today: date("2025-10-09"),
        };

        assert_eq!(build_status(input).unwrap(), build_status(input).unwrap());
    }

    #[test]
    fn test_missing_custody_data_is_flagged() {
        let household = household();
        let policy = policy();
        let fill = fill();
        let snapshot = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &[],
            events: &[],
            household: &household,
            policy: &policy,
            today: date("2025-10-09"),
        })
        .unwrap();

        assert!(!snapshot.has_custody_data);
        // Everything falls to the default parent, who is also the target
        let breakdown = snapshot.breakdown.unwrap();
        assert_eq!(breakdown.tally.count(&ParentId::new("mother")), 30);
    }

    #[test]
    fn test_unrepresentable_window_is_an_error() {
        let household = household();
        let policy = RefillPolicy {
            lookahead_days: u32::MAX,
            ..policy()
        };
        let fill = fill();

        let result = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &[],
            events: &events(),
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        });

        assert!(matches!(result, Err(crate::Error::InvalidSupply(_))));
    }

    #[test]
    fn test_ledger_inconsistency_propagates() {
        let household = household();
        let policy = policy();
        let fill = fill();
        let dists = vec![Distribution {
            id: Uuid::new_v4(),
            date: date("2025-10-13"),
            quantity: 45,
            fill_id: fill.id,
            notes: None,
            recorded_at: Utc::now(),
        }];

        let result = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &dists,
            events: &events(),
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        });

        assert!(matches!(result, Err(crate::Error::LedgerInconsistency(_))));
    }

    #[test]
    fn test_large_distribution_run_out() {
        let household = household();
        let policy = policy();
        let mut fill = fill();
        fill.quantity = 120;
        let dists = vec![Distribution {
            id: Uuid::new_v4(),
            date: date("2025-10-13"),
            quantity: 100,
            fill_id: fill.id,
            notes: None,
            recorded_at: Utc::now(),
        }];

        let snapshot = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &dists,
            events: &events(),
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        })
        .unwrap();

        let inventory = snapshot.inventory.unwrap();
        // 100 mother days from Oct 13, skipping Oct 29-31
        assert_eq!(inventory.run_out_date, Some(date("2026-01-24")));
        assert!(snapshot.next_distribution.is_some());
    }

    #[test]
    fn test_stock_outlasting_every_widening() {
        let config: Config = toml::from_str(
            r#"
[household]
parents = [{ id = "father", matcher = "Brian" }, { id = "mother" }]
default_parent = "mother"
target_parent = "father"
"#,
        )
        .unwrap();
        let household = config.household().unwrap();
        let policy = policy();
        let fill = fill();
        let dists = vec![Distribution {
            id: Uuid::new_v4(),
            date: date("2025-10-13"),
            quantity: 10,
            fill_id: fill.id,
            notes: None,
            recorded_at: Utc::now(),
        }];

        let snapshot = build_status(StatusInput {
            latest_fill: Some(&fill),
            distributions: &dists,
            events: &events(),
            household: &household,
            policy: &policy,
            today: date("2025-10-20"),
        })
        .unwrap();

        // Father only has three mornings in the calendar
        let inventory = snapshot.inventory.unwrap();
        assert_eq!(inventory.holder, ParentId::new("mother"));
        assert_eq!(inventory.pills_remaining, 10);
        assert_eq!(inventory.run_out_date, None);
        assert!(snapshot.next_distribution.is_none());
    }
}
