//! Scope inspection and repair planning

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ScopeKey, ScopeSnapshot};

/// Health of one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeState {
    /// Values are exactly `1..=N`
    Consistent,
    /// Some rows still hold negative bulk-reorder placeholders
    Quarantined,
    /// Gaps, duplicates or parked rows left by a foreign partial write
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub scope: ScopeKey,
    pub state: ScopeState,
    pub len: usize,
    /// Values held by more than one row
    pub duplicates: Vec<i32>,
    /// Values of `1..=N` nobody holds
    pub gaps: Vec<i32>,
    /// Rows on a negative placeholder
    pub negatives: usize,
}

impl ScopeReport {
    pub fn is_consistent(&self) -> bool {
        self.state == ScopeState::Consistent
    }
}

pub fn inspect(snapshot: &ScopeSnapshot) -> ScopeReport {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for slot in &snapshot.slots {
        *counts.entry(slot.display_order).or_default() += 1;
    }

    let duplicates: Vec<i32> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(order, _)| *order)
        .collect();
    let gaps: Vec<i32> = (1..=snapshot.max_order())
        .filter(|order| !counts.contains_key(order))
        .collect();
    let negatives = snapshot
        .slots
        .iter()
        .filter(|s| s.display_order < 0)
        .count();

    let state = if negatives > 0 {
        ScopeState::Quarantined
    } else if duplicates.is_empty() && gaps.is_empty() {
        ScopeState::Consistent
    } else {
        ScopeState::Unknown
    };

    ScopeReport {
        scope: snapshot.scope,
        state,
        len: snapshot.len(),
        duplicates,
        gaps,
        negatives,
    }
}

/// Member order that restores density, or an empty list for a consistent scope
///
/// Placeholder rows come first by placeholder index (they carry the order of
/// an interrupted bulk reorder), then positive rows by `(display_order, id)`,
/// then parked rows by id.
pub fn plan_repair(snapshot: &ScopeSnapshot) -> Vec<i64> {
    if inspect(snapshot).is_consistent() {
        return Vec::new();
    }

    let mut placeholders: Vec<(i32, i64)> = Vec::new();
    let mut positives: Vec<(i32, i64)> = Vec::new();
    let mut parked: Vec<i64> = Vec::new();
    for slot in &snapshot.slots {
        match slot.display_order {
            o if o < 0 => placeholders.push((o.saturating_neg(), slot.id)),
            o if o > 0 => positives.push((o, slot.id)),
            _ => parked.push(slot.id),
        }
    }
    placeholders.sort();
    positives.sort();
    parked.sort();

    placeholders
        .into_iter()
        .map(|(_, id)| id)
        .chain(positives.into_iter().map(|(_, id)| id))
        .chain(parked)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::OrderSlot;

    fn scope(pairs: &[(i64, i32)]) -> ScopeSnapshot {
        ScopeSnapshot::new(
            ScopeKey::Category(1),
            pairs.iter().map(|(id, o)| OrderSlot::new(*id, *o)).collect(),
        )
    }

    #[test]
    fn dense_scope_is_consistent() {
        let report = inspect(&scope(&[(1, 1), (2, 2), (3, 3)]));
        assert_eq!(report.state, ScopeState::Consistent);
        assert!(report.duplicates.is_empty());
        assert!(report.gaps.is_empty());
        assert!(plan_repair(&scope(&[(1, 1), (2, 2)])).is_empty());
    }

    #[test]
    fn empty_scope_is_consistent() {
        assert!(inspect(&scope(&[])).is_consistent());
    }

    #[test]
    fn negatives_mean_quarantined() {
        let report = inspect(&scope(&[(1, -1), (2, -2), (3, 3)]));
        assert_eq!(report.state, ScopeState::Quarantined);
        assert_eq!(report.negatives, 2);
    }

    #[test]
    fn duplicates_and_gaps_are_reported() {
        let report = inspect(&scope(&[(1, 1), (2, 1), (3, 4)]));
        assert_eq!(report.state, ScopeState::Unknown);
        assert_eq!(report.duplicates, vec![1]);
        assert_eq!(report.gaps, vec![2, 3]);
    }

    #[test]
    fn parked_row_is_unknown() {
        let report = inspect(&scope(&[(1, 0), (2, 1)]));
        assert_eq!(report.state, ScopeState::Unknown);
        assert_eq!(report.gaps, vec![2]);
    }

    #[test]
    fn repair_order_keeps_placeholders_first() {
        // interrupted reorder: 7 and 5 quarantined, 6 still on its old value
        let plan = plan_repair(&scope(&[(5, -2), (6, 2), (7, -1)]));
        assert_eq!(plan, vec![7, 5, 6]);
    }

    #[test]
    fn repair_order_breaks_ties_by_id() {
        let plan = plan_repair(&scope(&[(9, 2), (4, 2), (3, 0), (8, 5)]));
        assert_eq!(plan, vec![4, 9, 8, 3]);
    }
}
