//! Calendar reminders derived from a status snapshot.
//!
//! Summaries carry [`REMINDER_TAG`] so that reminders written to a shared
//! calendar can be found and replaced on the next run.

use crate::status::StatusSnapshot;
use chrono::NaiveDate;
use serde::Serialize;

pub const REMINDER_TAG: &str = "[PILLS]";

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    RunOut,
    RefillEligible,
    DistributionDue,
}

impl ReminderKind {
    /// Popup alerts, in minutes before the all-day event
    fn alerts(self) -> Vec<u32> {
        match self {
            ReminderKind::RunOut => vec![1440],
            ReminderKind::RefillEligible => vec![0],
            ReminderKind::DistributionDue => vec![60, 1440],
        }
    }
}

/// One all-day reminder
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReminderEvent {
    pub kind: ReminderKind,
    pub date: NaiveDate,
    pub summary: String,
    pub description: String,
    pub alert_minutes_before: Vec<u32>,
}

impl ReminderEvent {
    fn new(kind: ReminderKind, date: NaiveDate, summary: String, description: String) -> Self {
        Self {
            kind,
            date,
            summary: format!("{} {}", REMINDER_TAG, summary),
            description,
            alert_minutes_before: kind.alerts(),
        }
    }
}

/// Reminders for the upcoming run-out, refill and distribution dates.
///
/// Dates already behind `snapshot.today` produce no reminder.
pub fn plan_reminders(snapshot: &StatusSnapshot, target_label: &str) -> Vec<ReminderEvent> {
    let mut events = Vec::new();

    if let Some(run_out) = snapshot.inventory.as_ref().and_then(|i| i.run_out_date) {
        events.push(ReminderEvent::new(
            ReminderKind::RunOut,
            run_out,
            format!("{} out of meds", target_label),
            format!("{} runs out of medication today.", target_label),
        ));
    }

    if let Some(refill) = &snapshot.refill {
        events.push(ReminderEvent::new(
            ReminderKind::RefillEligible,
            refill.eligible_date,
            "Can refill prescription".to_string(),
            format!(
                "Eligible to refill the prescription filled on {}. Contact the pharmacy.",
                refill.fill_date
            ),
        ));
    }

    if let Some(plan) = &snapshot.next_distribution {
        let mut description = format!(
            "Give {} pills to {} for the pill days {}.",
            plan.quantity, target_label, plan.supply_window
        );
        if let Some(blocked) = &plan.blocked_by {
            description.push_str(&format!(
                "\n\nWaiting on a refill, eligible {}.",
                blocked.eligible_date
            ));
            if plan.uncovered_pill_days > 0 {
                description.push_str(&format!(
                    " {} pill days before then have no stock.",
                    plan.uncovered_pill_days
                ));
            }
        }
        events.push(ReminderEvent::new(
            ReminderKind::DistributionDue,
            plan.distribution_date,
            format!("Give {} pills to {}", plan.quantity, target_label),
            description,
        ));
    }

    events.retain(|e| e.date >= snapshot.today);
    events.sort_by_key(|e| (e.date, e.kind));

    tracing::debug!("Planned {} reminders", events.len());
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{StatusSnapshot, TargetInventory};
    use crate::{DateWindow, DistributionPlan, ParentId, RefillEligibility};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn snapshot(today: &str) -> StatusSnapshot {
        let refill = RefillEligibility {
            fill_date: date("2025-10-08"),
            eligible_date: date("2025-11-02"),
            days_until: 13,
            can_refill: false,
        };
        StatusSnapshot {
            today: date(today),
            has_custody_data: true,
            fill: None,
            refill: Some(refill.clone()),
            inventory: Some(TargetInventory {
                target: ParentId::new("mother"),
                holder: ParentId::new("father"),
                last_distribution: None,
                total_distributed: 16,
                pills_remaining: 8,
                pills_with_holder: 14,
                run_out_date: Some(date("2025-10-29")),
                days_until_run_out: Some(9),
                is_out: false,
            }),
            next_distribution: Some(DistributionPlan {
                pill_day: date("2025-11-01"),
                distribution_date: date("2025-10-31"),
                quantity: 31,
                supply_window: DateWindow::new(date("2025-11-02"), date("2025-12-01")).unwrap(),
                blocked_by: Some(refill),
                uncovered_pill_days: 1,
            }),
            breakdown: None,
        }
    }

    #[test]
    fn test_three_reminders_in_date_order() {
        let events = plan_reminders(&snapshot("2025-10-20"), "Mom");

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ReminderKind::RunOut,
                ReminderKind::DistributionDue,
                ReminderKind::RefillEligible,
            ]
        );
        assert!(events.iter().all(|e| e.summary.starts_with(REMINDER_TAG)));

        let give = &events[1];
        assert_eq!(give.date, date("2025-10-31"));
        assert_eq!(give.summary, "[PILLS] Give 31 pills to Mom");
        assert!(give.description.contains("2025-11-02 to 2025-12-01"));
        assert!(give.description.contains("1 pill days before then"));
        assert_eq!(give.alert_minutes_before, vec![60, 1440]);
    }

    #[test]
    fn test_past_dates_dropped() {
        let events = plan_reminders(&snapshot("2025-10-30"), "Mom");
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ReminderKind::DistributionDue, ReminderKind::RefillEligible]
        );
    }

    #[test]
    fn test_empty_snapshot_has_no_reminders() {
        let empty = StatusSnapshot {
            today: date("2025-10-20"),
            has_custody_data: false,
            fill: None,
            refill: None,
            inventory: None,
            next_distribution: None,
            breakdown: None,
        };
        assert!(plan_reminders(&empty, "Mom").is_empty());
    }
}
