//! Custody block parsing.
//!
//! Turns raw calendar entries into merged, window-clipped custody blocks per
//! parent. Sorts events by start time and merges overlapping or touching
//! intervals of the same parent.

use crate::{CustodyBlock, CustodySchedule, Error, ParentId, RawEvent, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Title substrings that identify each parent's custody entries.
///
/// At most two parents; a household where only one parent is named in the
/// calendar leaves every other morning to the default parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentMatchers {
    entries: Vec<(ParentId, String)>,
}

impl ParentMatchers {
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ParentId, String)>,
    {
        let entries: Vec<(ParentId, String)> = entries.into_iter().collect();

        if entries.len() > 2 {
            return Err(Error::Config(format!(
                "custody matching supports two parents, {} configured",
                entries.len()
            )));
        }
        if let Some((parent, _)) = entries.iter().find(|(_, s)| s.is_empty()) {
            return Err(Error::Config(format!(
                "empty calendar title matcher for {}",
                parent
            )));
        }
        if entries.len() == 2 && entries[0].0 == entries[1].0 {
            return Err(Error::Config(format!(
                "parent {} has two matchers",
                entries[0].0
            )));
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The parent whose substring occurs in `title`.
    ///
    /// `Ok(None)` for titles naming nobody; a title naming both parents is
    /// ambiguous.
    pub fn owner_of(&self, title: &str) -> std::result::Result<Option<&ParentId>, (ParentId, ParentId)> {
        let mut hits = self
            .entries
            .iter()
            .filter(|(_, needle)| title.contains(needle.as_str()))
            .map(|(p, _)| p);

        match (hits.next(), hits.next()) {
            (Some(a), Some(b)) => Err((a.clone(), b.clone())),
            (first, _) => Ok(first),
        }
    }
}

/// Parse raw calendar events into custody blocks inside `[window_start, window_end)`.
///
/// Event instants are read in their own UTC offset, so a 17:00 hand-off stays
/// a 17:00 hand-off on the household's calendar date.
pub fn parse_custody_blocks(
    events: &[RawEvent],
    matchers: &ParentMatchers,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<CustodySchedule> {
    let mut by_parent: BTreeMap<ParentId, Vec<(NaiveDateTime, NaiveDateTime)>> = BTreeMap::new();
    let mut matched = 0usize;

    for event in events {
        let owner = match matchers.owner_of(&event.title) {
            Ok(Some(owner)) => owner,
            Ok(None) => continue,
            Err((first, second)) => {
                let date = event.start.naive_local().date();
                tracing::error!(
                    "Calendar entry '{}' names both {} and {}",
                    event.title,
                    first,
                    second
                );
                return Err(Error::ConflictingCustody {
                    date,
                    first,
                    second,
                });
            }
        };

        let start = event.start.naive_local();
        let end = event.end.naive_local();
        if end <= start {
            tracing::warn!(
                "Skipping custody entry '{}' with end {} not after start {}",
                event.title,
                end,
                start
            );
            continue;
        }
        matched += 1;

        // Discard entries entirely outside the window, clip the rest.
        if start >= window_end || end <= window_start {
            continue;
        }
        by_parent
            .entry(owner.clone())
            .or_default()
            .push((start.max(window_start), end.min(window_end)));
    }

    let mut blocks = Vec::new();
    for (owner, intervals) in by_parent {
        for (start, end) in merge_intervals(intervals) {
            blocks.push(CustodyBlock {
                owner: owner.clone(),
                start,
                end,
            });
        }
    }
    blocks.sort_by(|a, b| (a.start, &a.owner).cmp(&(b.start, &b.owner)));

    tracing::debug!(
        "Parsed {} custody blocks from {} matching of {} calendar entries",
        blocks.len(),
        matched,
        events.len()
    );

    Ok(CustodySchedule {
        has_custody_data: !blocks.is_empty(),
        blocks,
    })
}

/// Merge overlapping or adjacent intervals into a sorted, disjoint list.
fn merge_intervals(
    mut intervals: Vec<(NaiveDateTime, NaiveDateTime)>,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    intervals.sort();

    let mut merged: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }
    merged
}
