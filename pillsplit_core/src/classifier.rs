//! Pill-day classification.
//!
//! Applies the hand-off rule: the parent the child wakes up with gives that
//! morning's pill. A block running from `start` to `end` makes its owner
//! responsible for every date `d` with `date(start) < d <= date(end)`, so an
//! evening hand-off leaves the morning of that day with the previous parent.

use crate::{CustodyBlock, DateWindow, Error, ParentId, PillDayAssignment, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Pill days per parent over a window
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct PillDayTally {
    pub days: BTreeMap<ParentId, Vec<NaiveDate>>,
}

impl PillDayTally {
    /// Number of pill days for `parent`
    pub fn count(&self, parent: &ParentId) -> usize {
        self.days.get(parent).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }
}

/// Assign each date in `window` to the parent who gives that day's pill.
///
/// Dates no block claims go to `default_owner`. Two blocks claiming the same
/// morning is an error, never a tie-break.
pub fn classify(
    blocks: &[CustodyBlock],
    default_owner: &ParentId,
    window: DateWindow,
) -> Result<Vec<PillDayAssignment>> {
    let parents: BTreeSet<&ParentId> = blocks
        .iter()
        .map(|b| &b.owner)
        .chain(std::iter::once(default_owner))
        .collect();
    if parents.len() > 2 {
        return Err(Error::Config(format!(
            "custody involves {} parents ({}), only two are supported",
            parents.len(),
            parents
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let mut claimed: BTreeMap<NaiveDate, &ParentId> = BTreeMap::new();
    for block in blocks {
        let first_morning = block.start.date().succ_opt();
        let last_morning = block.end.date();

        let Some(first_morning) = first_morning else {
            continue;
        };
        let from = first_morning.max(window.start);
        let to = last_morning.min(window.end);

        for date in from.iter_days().take_while(|d| *d <= to) {
            if let Some(previous) = claimed.insert(date, &block.owner) {
                tracing::error!(
                    "Two custody blocks claim {}: {} and {}",
                    date,
                    previous,
                    block.owner
                );
                return Err(Error::ConflictingCustody {
                    date,
                    first: previous.clone(),
                    second: block.owner.clone(),
                });
            }
        }
    }

    let assignments: Vec<PillDayAssignment> = window
        .dates()
        .map(|date| PillDayAssignment {
            date,
            responsible: claimed.get(&date).copied().unwrap_or(default_owner).clone(),
        })
        .collect();

    tracing::debug!(
        "Classified {} pill days ({} claimed by custody blocks) for {}",
        assignments.len(),
        claimed.len(),
        window
    );

    Ok(assignments)
}

/// Group assignments by responsible parent
pub fn tally(assignments: &[PillDayAssignment]) -> PillDayTally {
    let mut tally = PillDayTally::default();
    for assignment in assignments {
        tally
            .days
            .entry(assignment.responsible.clone())
            .or_default()
            .push(assignment.date);
    }
    tally
}

/// First pill day of `owner` strictly after `after`
pub fn next_pill_day(
    assignments: &[PillDayAssignment],
    owner: &ParentId,
    after: NaiveDate,
) -> Option<NaiveDate> {
    assignments
        .iter()
        .find(|a| a.date > after && &a.responsible == owner)
        .map(|a| a.date)
}
