//! Order assignment planning
//!
//! Pure functions over a [`ScopeSnapshot`]. Each plan lists its writes in
//! collision-free application order:
//! - up-shifts (`+1`) by descending current order
//! - down-shifts (`-1`) by ascending current order
//! - a repositioned member is parked on [`PARKING_SLOT`] before the shifts
//!
//! so a store enforcing `UNIQUE (scope, display_order)` after every single
//! statement accepts each write.

use std::collections::{HashMap, HashSet};

use super::{OrderSlot, OrderingError, PARKING_SLOT, ScopeSnapshot};

/// Move of one member by exactly one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub id: i64,
    pub from: i32,
    pub to: i32,
}

impl Shift {
    pub fn slot(&self) -> OrderSlot {
        OrderSlot::new(self.id, self.to)
    }
}

fn shift_slots(shifts: &[Shift]) -> impl Iterator<Item = OrderSlot> + '_ {
    shifts.iter().map(Shift::slot)
}

/// Placement of a new member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    /// Applied before the new row is written
    pub shifts: Vec<Shift>,
    pub new_order: i32,
}

impl InsertPlan {
    pub fn writes(&self) -> Vec<OrderSlot> {
        shift_slots(&self.shifts).collect()
    }
}

/// Compaction after a member left the scope
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeletePlan {
    pub shifts: Vec<Shift>,
}

impl DeletePlan {
    pub fn writes(&self) -> Vec<OrderSlot> {
        shift_slots(&self.shifts).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositionPlan {
    pub id: i64,
    pub from: i32,
    pub to: i32,
    pub shifts: Vec<Shift>,
}

impl RepositionPlan {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Park, shift, land. Empty for a no-op.
    pub fn writes(&self) -> Vec<OrderSlot> {
        if self.is_noop() {
            return Vec::new();
        }
        let mut writes = Vec::with_capacity(self.shifts.len() + 2);
        writes.push(OrderSlot::new(self.id, PARKING_SLOT));
        writes.extend(shift_slots(&self.shifts));
        writes.push(OrderSlot::new(self.id, self.to));
        writes
    }

    /// Final value of every member the plan touches
    pub fn assignments(&self) -> Vec<OrderSlot> {
        if self.is_noop() {
            return Vec::new();
        }
        let mut out: Vec<OrderSlot> = shift_slots(&self.shifts).collect();
        out.push(OrderSlot::new(self.id, self.to));
        out
    }
}

/// Replacement of a whole scope's assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPlan {
    /// Phase one: every member on a distinct negative placeholder
    pub quarantine: Vec<OrderSlot>,
    /// Phase two: final values `1..=N` in list order
    pub commit: Vec<OrderSlot>,
    /// The scope already holds exactly the committed values
    pub unchanged: bool,
}

/// `max + 1`, or 1 for an empty scope
pub fn plan_append(snapshot: &ScopeSnapshot) -> i32 {
    snapshot
        .slots
        .iter()
        .map(|s| s.display_order)
        .max()
        .map_or(1, |max| max.max(0) + 1)
}

/// Make room at `target` for a new member
///
/// A target past the end clamps to `N + 1` (append).
pub fn plan_insert_at(snapshot: &ScopeSnapshot, target: i32) -> Result<InsertPlan, OrderingError> {
    let end = snapshot.max_order() + 1;
    if target < 1 {
        return Err(OrderingError::OutOfRange {
            scope: snapshot.scope,
            requested: target,
            max: end,
        });
    }
    let new_order = target.min(end);

    let mut shifts: Vec<Shift> = snapshot
        .slots
        .iter()
        .filter(|s| s.display_order >= new_order)
        .map(|s| Shift {
            id: s.id,
            from: s.display_order,
            to: s.display_order + 1,
        })
        .collect();
    shifts.sort_by(|a, b| b.from.cmp(&a.from));

    Ok(InsertPlan { shifts, new_order })
}

/// Close the gap left by a removed member
///
/// `snapshot` is the scope after the removal.
pub fn plan_delete(snapshot: &ScopeSnapshot, deleted_order: i32) -> DeletePlan {
    let mut shifts: Vec<Shift> = snapshot
        .slots
        .iter()
        .filter(|s| s.display_order > deleted_order)
        .map(|s| Shift {
            id: s.id,
            from: s.display_order,
            to: s.display_order - 1,
        })
        .collect();
    shifts.sort_by_key(|s| s.from);
    DeletePlan { shifts }
}

/// Move one member to `new_order`, shifting the members in between
pub fn plan_reposition(
    snapshot: &ScopeSnapshot,
    id: i64,
    new_order: i32,
) -> Result<RepositionPlan, OrderingError> {
    let from = snapshot.order_of(id).ok_or(OrderingError::NotFound {
        scope: snapshot.scope,
        id,
    })?;
    let max = snapshot.max_order();
    if new_order < 1 || new_order > max {
        return Err(OrderingError::OutOfRange {
            scope: snapshot.scope,
            requested: new_order,
            max,
        });
    }

    let mut shifts: Vec<Shift> = Vec::new();
    if new_order > from {
        shifts.extend(
            snapshot
                .slots
                .iter()
                .filter(|s| s.id != id && s.display_order > from && s.display_order <= new_order)
                .map(|s| Shift {
                    id: s.id,
                    from: s.display_order,
                    to: s.display_order - 1,
                }),
        );
        shifts.sort_by_key(|s| s.from);
    } else if new_order < from {
        shifts.extend(
            snapshot
                .slots
                .iter()
                .filter(|s| s.id != id && s.display_order >= new_order && s.display_order < from)
                .map(|s| Shift {
                    id: s.id,
                    from: s.display_order,
                    to: s.display_order + 1,
                }),
        );
        shifts.sort_by(|a, b| b.from.cmp(&a.from));
    }

    Ok(RepositionPlan {
        id,
        from,
        to: new_order,
        shifts,
    })
}

/// Assign `ordered_ids[i]` the value `i + 1`
///
/// The list must name every member of the scope exactly once.
pub fn plan_bulk_reorder(
    snapshot: &ScopeSnapshot,
    ordered_ids: &[i64],
) -> Result<BulkPlan, OrderingError> {
    let members: HashSet<i64> = snapshot.slots.iter().map(|s| s.id).collect();

    let mut seen: HashSet<i64> = HashSet::with_capacity(ordered_ids.len());
    let mut duplicated = Vec::new();
    let mut unknown = Vec::new();
    for id in ordered_ids {
        if !seen.insert(*id) {
            if !duplicated.contains(id) {
                duplicated.push(*id);
            }
        } else if !members.contains(id) {
            unknown.push(*id);
        }
    }
    let missing: Vec<i64> = snapshot
        .slots
        .iter()
        .map(|s| s.id)
        .filter(|id| !seen.contains(id))
        .collect();

    if ordered_ids.len() != snapshot.len()
        || !duplicated.is_empty()
        || !unknown.is_empty()
        || !missing.is_empty()
    {
        return Err(OrderingError::IncompleteReorder {
            scope: snapshot.scope,
            expected: snapshot.len(),
            received: ordered_ids.len(),
            missing,
            unknown,
            duplicated,
        });
    }

    // Placeholders must not collide with negatives already in the scope.
    let offset = snapshot
        .slots
        .iter()
        .map(|s| s.display_order)
        .filter(|o| *o < 0)
        .map(|o| o.saturating_neg())
        .max()
        .unwrap_or(0);

    let mut quarantine = Vec::with_capacity(ordered_ids.len());
    let mut commit = Vec::with_capacity(ordered_ids.len());
    for (index, id) in ordered_ids.iter().enumerate() {
        let position = i32::try_from(index + 1).unwrap_or(i32::MAX);
        quarantine.push(OrderSlot::new(*id, -(offset.saturating_add(position))));
        commit.push(OrderSlot::new(*id, position));
    }

    let current: HashMap<i64, i32> = snapshot
        .slots
        .iter()
        .map(|s| (s.id, s.display_order))
        .collect();
    let unchanged = commit
        .iter()
        .all(|c| current.get(&c.id) == Some(&c.display_order));

    Ok(BulkPlan {
        quarantine,
        commit,
        unchanged,
    })
}
