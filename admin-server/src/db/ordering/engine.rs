//! Ordering engine
//!
//! Runs sequencer plans against an [`OrderStore`]. Each public function is one
//! step of a logical operation inside the caller's transaction:
//! 1. lock the scope and load its rows
//! 2. renumber the scope first if it is not dense
//! 3. plan, then write in plan order, one awaited statement at a time
//! 4. reload and check density
//!
//! Any error leaves the transaction to be rolled back by the caller.

use serde::Serialize;
use shared::ordering::sequencer::{self, InsertPlan};
use shared::ordering::{
    BulkPlan, OrderSlot, OrderingError, ReorderStrategy, ScopeKey, ScopeReport, ScopeSnapshot,
    audit,
};

use super::OrderedTable;
use super::store::{BoxError, OrderStore};

/// Effect of an operation on one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeChange {
    pub scope: ScopeKey,
    /// Final value of every row the operation wrote
    pub assignments: Vec<OrderSlot>,
    /// The scope was renumbered before the operation
    pub repaired: bool,
}

/// Room made for a new member; the caller inserts it at `order`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub order: i32,
    pub change: ScopeChange,
}

/// Member moved to another scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub order: i32,
    pub source: ScopeChange,
    pub target: ScopeChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repair {
    /// State before the repair
    pub report: ScopeReport,
    pub assignments: Vec<OrderSlot>,
}

fn store_failure(table: &OrderedTable, scope: ScopeKey, err: BoxError) -> OrderingError {
    tracing::error!(table = table.name, scope = %scope, error = %err, "Order store failure");
    OrderingError::StoreFailure {
        scope,
        message: err.to_string(),
    }
}

async fn load<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<ScopeSnapshot, OrderingError> {
    let slots = store
        .load_scope(table, scope)
        .await
        .map_err(|e| store_failure(table, scope, e))?;
    Ok(ScopeSnapshot::new(scope, slots))
}

async fn read<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<ScopeSnapshot, OrderingError> {
    let slots = store
        .read_scope(table, scope)
        .await
        .map_err(|e| store_failure(table, scope, e))?;
    Ok(ScopeSnapshot::new(scope, slots))
}

async fn lock<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<(), OrderingError> {
    if !table.kind.accepts(scope) {
        return Err(store_failure(
            table,
            scope,
            format!("scope {scope} does not apply to {}", table.name).into(),
        ));
    }
    store
        .lock_scope(table, scope)
        .await
        .map_err(|e| store_failure(table, scope, e))
}

/// Lock and load a scope, renumbering it when it is not dense
async fn open_scope<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<(ScopeSnapshot, bool), OrderingError> {
    lock(store, table, scope).await?;
    let snapshot = load(store, table, scope).await?;
    let report = audit::inspect(&snapshot);
    if report.is_consistent() {
        return Ok((snapshot, false));
    }

    tracing::warn!(
        table = table.name,
        scope = %scope,
        state = ?report.state,
        duplicates = ?report.duplicates,
        gaps = ?report.gaps,
        negatives = report.negatives,
        "Renumbering inconsistent scope"
    );
    renumber(store, table, &snapshot).await?;
    Ok((load(store, table, scope).await?, true))
}

async fn renumber<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    snapshot: &ScopeSnapshot,
) -> Result<Vec<OrderSlot>, OrderingError> {
    let ids = audit::plan_repair(snapshot);
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let plan = sequencer::plan_bulk_reorder(snapshot, &ids)?;
    let scope = snapshot.scope;
    write_bulk(store, table, scope, &plan, ReorderStrategy::TwoPhase).await?;
    Ok(plan.commit)
}

/// Single-row writes, strictly in order
async fn apply_writes<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    writes: &[OrderSlot],
) -> Result<(), OrderingError> {
    for write in writes {
        let found = store
            .write_order(table, scope, write.id, write.display_order)
            .await
            .map_err(|e| store_failure(table, scope, e))?;
        if !found {
            return Err(store_failure(
                table,
                scope,
                format!("row {} is no longer in the scope", write.id).into(),
            ));
        }
    }
    Ok(())
}

async fn write_all<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    slots: &[OrderSlot],
) -> Result<(), OrderingError> {
    let matched = store
        .write_orders(table, scope, slots)
        .await
        .map_err(|e| store_failure(table, scope, e))?;
    if matched != slots.len() {
        return Err(store_failure(
            table,
            scope,
            format!("expected {} rows, updated {matched}", slots.len()).into(),
        ));
    }
    Ok(())
}

/// Deferred single statement, or quarantine then commit
async fn write_bulk<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    plan: &BulkPlan,
    strategy: ReorderStrategy,
) -> Result<(), OrderingError> {
    if plan.unchanged {
        return Ok(());
    }
    let deferred = match strategy {
        ReorderStrategy::Deferred => store
            .defer_uniqueness(table)
            .await
            .map_err(|e| store_failure(table, scope, e))?,
        ReorderStrategy::TwoPhase => false,
    };

    if deferred {
        write_all(store, table, scope, &plan.commit).await
    } else {
        write_all(store, table, scope, &plan.quarantine).await?;
        write_all(store, table, scope, &plan.commit).await
    }
}

/// Reload the scope and fail unless it is exactly `1..=N`
pub async fn ensure_dense<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<(), OrderingError> {
    let snapshot = load(store, table, scope).await?;
    let report = audit::inspect(&snapshot);
    if report.is_consistent() {
        return Ok(());
    }
    tracing::error!(
        table = table.name,
        scope = %scope,
        state = ?report.state,
        gaps = ?report.gaps,
        duplicates = ?report.duplicates,
        "Scope not dense after operation"
    );
    Err(OrderingError::ScopeInconsistent { scope })
}

/// Make room for a new member, appending when `target` is `None`
///
/// The caller inserts the row at [`Placement::order`] in the same
/// transaction, then calls [`ensure_dense`].
pub async fn place_new_member<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    target: Option<i32>,
) -> Result<Placement, OrderingError> {
    let (snapshot, repaired) = open_scope(store, table, scope).await?;
    let plan = match target {
        Some(target) => sequencer::plan_insert_at(&snapshot, target)?,
        None => InsertPlan {
            shifts: Vec::new(),
            new_order: sequencer::plan_append(&snapshot),
        },
    };
    let writes = plan.writes();
    apply_writes(store, table, scope, &writes).await?;

    tracing::debug!(
        table = table.name,
        scope = %scope,
        order = plan.new_order,
        shifted = writes.len(),
        "Placed new member"
    );
    Ok(Placement {
        order: plan.new_order,
        change: ScopeChange {
            scope,
            assignments: writes,
            repaired,
        },
    })
}

/// Delete a member and close the gap it leaves
pub async fn remove_member<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    id: i64,
) -> Result<ScopeChange, OrderingError> {
    let (snapshot, repaired) = open_scope(store, table, scope).await?;
    if !snapshot.contains(id) {
        return Err(OrderingError::NotFound { scope, id });
    }
    let removed = store
        .remove_member(table, scope, id)
        .await
        .map_err(|e| store_failure(table, scope, e))?
        .ok_or(OrderingError::NotFound { scope, id })?;

    let plan = sequencer::plan_delete(&snapshot.without(id), removed);
    let writes = plan.writes();
    apply_writes(store, table, scope, &writes).await?;
    ensure_dense(store, table, scope).await?;

    tracing::debug!(table = table.name, scope = %scope, id, order = removed, "Removed member");
    Ok(ScopeChange {
        scope,
        assignments: writes,
        repaired,
    })
}

/// Move a member to `new_order` within its scope
pub async fn reposition_member<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    id: i64,
    new_order: i32,
) -> Result<ScopeChange, OrderingError> {
    let (snapshot, repaired) = open_scope(store, table, scope).await?;
    let plan = sequencer::plan_reposition(&snapshot, id, new_order)?;
    apply_writes(store, table, scope, &plan.writes()).await?;
    if !plan.is_noop() {
        ensure_dense(store, table, scope).await?;
    }

    tracing::debug!(
        table = table.name,
        scope = %scope,
        id,
        from = plan.from,
        to = plan.to,
        "Repositioned member"
    );
    Ok(ScopeChange {
        scope,
        assignments: plan.assignments(),
        repaired,
    })
}

/// Replace the whole scope's order with `ordered_ids`
pub async fn reorder_scope<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
    ordered_ids: &[i64],
    strategy: ReorderStrategy,
) -> Result<ScopeChange, OrderingError> {
    let (snapshot, repaired) = open_scope(store, table, scope).await?;
    let plan = sequencer::plan_bulk_reorder(&snapshot, ordered_ids)?;
    write_bulk(store, table, scope, &plan, strategy).await?;
    ensure_dense(store, table, scope).await?;

    tracing::info!(
        table = table.name,
        scope = %scope,
        members = ordered_ids.len(),
        unchanged = plan.unchanged,
        %strategy,
        "Scope reordered"
    );
    Ok(ScopeChange {
        scope,
        assignments: if plan.unchanged { Vec::new() } else { plan.commit },
        repaired,
    })
}

/// Move a member into another scope, appending unless `target` names a position
///
/// Both scopes end up dense. Scopes are locked in key order.
pub async fn transfer_member<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    from: ScopeKey,
    to: ScopeKey,
    id: i64,
    target: Option<i32>,
) -> Result<Transfer, OrderingError> {
    let ((source, source_repaired), (dest, dest_repaired)) = if from <= to {
        let source = open_scope(store, table, from).await?;
        let dest = open_scope(store, table, to).await?;
        (source, dest)
    } else {
        let dest = open_scope(store, table, to).await?;
        let source = open_scope(store, table, from).await?;
        (source, dest)
    };

    let old_order = source
        .order_of(id)
        .ok_or(OrderingError::NotFound { scope: from, id })?;
    let plan = match target {
        Some(target) => sequencer::plan_insert_at(&dest, target)?,
        None => InsertPlan {
            shifts: Vec::new(),
            new_order: sequencer::plan_append(&dest),
        },
    };

    let mut dest_writes = plan.writes();
    apply_writes(store, table, to, &dest_writes).await?;
    let moved = store
        .relocate_member(table, from, to, id, plan.new_order)
        .await
        .map_err(|e| store_failure(table, to, e))?;
    if !moved {
        return Err(OrderingError::NotFound { scope: from, id });
    }
    dest_writes.push(OrderSlot::new(id, plan.new_order));

    let compaction = sequencer::plan_delete(&source.without(id), old_order);
    let source_writes = compaction.writes();
    apply_writes(store, table, from, &source_writes).await?;

    ensure_dense(store, table, from).await?;
    ensure_dense(store, table, to).await?;

    tracing::info!(
        table = table.name,
        id,
        from = %from,
        to = %to,
        order = plan.new_order,
        "Member moved to another scope"
    );
    Ok(Transfer {
        order: plan.new_order,
        source: ScopeChange {
            scope: from,
            assignments: source_writes,
            repaired: source_repaired,
        },
        target: ScopeChange {
            scope: to,
            assignments: dest_writes,
            repaired: dest_repaired,
        },
    })
}

/// Outcome of [`lock_member_scope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberScope {
    /// The member's scope is locked and it still belongs to it
    Locked(ScopeKey),
    /// Another transaction moved the member while the lock was awaited
    Moved,
    Missing,
}

/// Lock the scope a member currently belongs to, plus `also` when given
///
/// The member's scope is read before locking, so it is read again once the
/// locks are held. On [`MemberScope::Moved`] the caller must roll back and
/// start over.
pub async fn lock_member_scope<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    id: i64,
    also: Option<ScopeKey>,
) -> Result<MemberScope, OrderingError> {
    let fallback = also.unwrap_or(ScopeKey::Global);
    let Some(seen) = store
        .member_scope(table, id)
        .await
        .map_err(|e| store_failure(table, fallback, e))?
    else {
        return Ok(MemberScope::Missing);
    };

    let mut scopes = vec![seen];
    scopes.extend(also.filter(|scope| *scope != seen));
    scopes.sort();
    for scope in scopes {
        lock(store, table, scope).await?;
    }

    let current = store
        .member_scope(table, id)
        .await
        .map_err(|e| store_failure(table, seen, e))?;
    Ok(match current {
        Some(scope) if scope == seen => MemberScope::Locked(seen),
        Some(scope) => {
            tracing::debug!(
                table = table.name,
                id,
                seen = %seen,
                now = %scope,
                "Member moved before lock"
            );
            MemberScope::Moved
        }
        None => MemberScope::Missing,
    })
}

/// Renumber a scope that is not dense; a no-op for a consistent one
pub async fn repair_scope<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<Repair, OrderingError> {
    lock(store, table, scope).await?;
    let snapshot = load(store, table, scope).await?;
    let report = audit::inspect(&snapshot);
    if report.is_consistent() {
        return Ok(Repair {
            report,
            assignments: Vec::new(),
        });
    }

    let assignments = renumber(store, table, &snapshot).await?;
    ensure_dense(store, table, scope).await?;
    tracing::warn!(
        table = table.name,
        scope = %scope,
        state = ?report.state,
        renumbered = assignments.len(),
        "Scope repaired"
    );
    Ok(Repair {
        report,
        assignments,
    })
}

/// Current health of a scope, read without locking its rows
pub async fn audit_scope<S: OrderStore + ?Sized>(
    store: &mut S,
    table: &OrderedTable,
    scope: ScopeKey,
) -> Result<ScopeReport, OrderingError> {
    let snapshot = read(store, table, scope).await?;
    Ok(audit::inspect(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ordering::memory::MemoryOrderStore;
    use crate::db::ordering::{CATEGORIES, FAQ_ITEMS, SERVICES};
    use shared::ordering::ScopeState;

    const G: ScopeKey = ScopeKey::Global;

    fn is_dense(orders: &[(i64, i32)]) -> bool {
        orders
            .iter()
            .enumerate()
            .all(|(i, (_, order))| *order == i as i32 + 1)
    }

    fn no_duplicates(state: &[(i64, i32)]) -> bool {
        let mut seen = std::collections::HashSet::new();
        state.iter().all(|(_, order)| seen.insert(*order))
    }

    async fn create(
        store: &mut MemoryOrderStore,
        scope: ScopeKey,
        id: i64,
        target: Option<i32>,
    ) -> Placement {
        let placement = place_new_member(store, &FAQ_ITEMS, scope, target).await.unwrap();
        store.insert(&FAQ_ITEMS, scope, id, placement.order).unwrap();
        ensure_dense(store, &FAQ_ITEMS, scope).await.unwrap();
        store.commit().unwrap();
        placement
    }

    #[tokio::test]
    async fn test_lifecycle_scenario() {
        let (a, b, c, d) = (1, 2, 3, 4);
        let mut store =
            MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(a, 1), (b, 2), (c, 3)]);

        remove_member(&mut store, &FAQ_ITEMS, G, b).await.unwrap();
        store.commit().unwrap();
        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(a, 1), (c, 2)]);

        let placement = create(&mut store, G, d, None).await;
        assert_eq!(placement.order, 3);
        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(a, 1), (c, 2), (d, 3)]);

        let change = reposition_member(&mut store, &FAQ_ITEMS, G, a, 3).await.unwrap();
        store.commit().unwrap();
        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(c, 1), (d, 2), (a, 3)]);
        assert_eq!(change.assignments.len(), 3);

        reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[a, c, d],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap();
        store.commit().unwrap();
        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(a, 1), (c, 2), (d, 3)]);
    }

    #[tokio::test]
    async fn test_append_yields_n_plus_one() {
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2)]);
        let placement = create(&mut store, G, 3, None).await;
        assert_eq!(placement.order, 3);
        assert!(placement.change.assignments.is_empty());
        assert!(store.locked(&FAQ_ITEMS, G));
    }

    #[tokio::test]
    async fn test_insert_at_front_shifts_everyone() {
        let mut store =
            MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2), (3, 3)]);
        let placement = create(&mut store, G, 9, Some(1)).await;
        assert_eq!(placement.order, 1);
        assert_eq!(store.ids(&FAQ_ITEMS, G), vec![9, 1, 2, 3]);
        assert!(store.history(&FAQ_ITEMS, G).iter().all(|s| no_duplicates(s)));
    }

    #[tokio::test]
    async fn test_insert_without_row_is_caught() {
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2)]);
        place_new_member(&mut store, &FAQ_ITEMS, G, Some(1)).await.unwrap();
        let err = ensure_dense(&mut store, &FAQ_ITEMS, G).await.unwrap_err();
        assert_eq!(err, OrderingError::ScopeInconsistent { scope: G });
    }

    #[tokio::test]
    async fn test_reposition_round_trip() {
        let members: Vec<(i64, i32)> = (1..=6).map(|i| (i * 10, i as i32)).collect();
        let mut store = MemoryOrderStore::new().with_members(&CATEGORIES, G, &members);

        reposition_member(&mut store, &CATEGORIES, G, 20, 5).await.unwrap();
        assert_eq!(store.ids(&CATEGORIES, G), vec![10, 30, 40, 50, 20, 60]);
        reposition_member(&mut store, &CATEGORIES, G, 20, 2).await.unwrap();
        store.commit().unwrap();
        assert_eq!(store.orders(&CATEGORIES, G), members);
    }

    #[tokio::test]
    async fn test_reposition_rejects_out_of_range_before_writing() {
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2)]);
        let err = reposition_member(&mut store, &FAQ_ITEMS, G, 1, 3).await.unwrap_err();
        assert!(matches!(err, OrderingError::OutOfRange { requested: 3, max: 2, .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_member() {
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1)]);
        let err = remove_member(&mut store, &FAQ_ITEMS, G, 99).await.unwrap_err();
        assert_eq!(err, OrderingError::NotFound { scope: G, id: 99 });
    }

    #[tokio::test]
    async fn test_bulk_reorder_never_duplicates() {
        let mut store =
            MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2), (3, 3)]);
        let change = reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[3, 1, 2],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap();
        store.commit().unwrap();

        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(3, 1), (1, 2), (2, 3)]);
        assert_eq!(
            change.assignments,
            vec![OrderSlot::new(3, 1), OrderSlot::new(1, 2), OrderSlot::new(2, 3)]
        );
        let history = store.history(&FAQ_ITEMS, G);
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|s| no_duplicates(s)));
    }

    #[tokio::test]
    async fn test_deferred_reorder_single_phase() {
        let mut store = MemoryOrderStore::new()
            .with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2), (3, 3)])
            .deferrable(true);
        reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[2, 3, 1],
            ReorderStrategy::Deferred,
        )
        .await
        .unwrap();
        assert_eq!(store.write_count(), 3);
        store.commit().unwrap();
        assert_eq!(store.ids(&FAQ_ITEMS, G), vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_deferred_falls_back_to_two_phase() {
        let mut store = MemoryOrderStore::new()
            .with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2), (3, 3)])
            .deferrable(false);
        reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[2, 3, 1],
            ReorderStrategy::Deferred,
        )
        .await
        .unwrap();
        assert_eq!(store.write_count(), 6);
        assert_eq!(store.ids(&FAQ_ITEMS, G), vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_same_order_writes_nothing() {
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, 1), (2, 2)]);
        let change = reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[1, 2],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap();
        assert!(change.assignments.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_reorder_leaves_scope_unchanged() {
        let before = vec![(1, 1), (2, 2), (3, 3)];
        let mut store = MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &before);
        let err = reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[3, 1],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            OrderingError::IncompleteReorder {
                expected: 3,
                received: 2,
                ..
            }
        ));
        assert_eq!(store.write_count(), 0);
        store.rollback();
        assert_eq!(store.orders(&FAQ_ITEMS, G), before);
    }

    #[tokio::test]
    async fn test_foreign_scope_id_is_incomplete() {
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, ScopeKey::Category(1), &[(11, 1), (12, 2)])
            .with_members(&SERVICES, ScopeKey::Category(2), &[(21, 1)]);
        let err = reorder_scope(
            &mut store,
            &SERVICES,
            ScopeKey::Category(1),
            &[11, 21],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            OrderingError::IncompleteReorder { ref unknown, .. } if unknown == &vec![21]
        ));
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back() {
        let before = vec![(1, 1), (2, 2), (3, 3), (4, 4)];
        let mut store = MemoryOrderStore::new()
            .with_members(&FAQ_ITEMS, G, &before)
            .fail_on_write(5);
        let err = reorder_scope(
            &mut store,
            &FAQ_ITEMS,
            G,
            &[4, 3, 2, 1],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap_err();
        assert!(err.is_store_failure());

        // interrupted after the quarantine phase
        assert!(store.orders(&FAQ_ITEMS, G).iter().all(|(_, o)| *o < 0));
        store.rollback();
        assert_eq!(store.orders(&FAQ_ITEMS, G), before);
    }

    #[tokio::test]
    async fn test_scope_isolation() {
        let c1 = ScopeKey::Category(1);
        let c2 = ScopeKey::Category(2);
        let other = vec![(21, 1), (22, 2), (23, 3)];
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, c1, &[(11, 1), (12, 2), (13, 3)])
            .with_members(&SERVICES, c2, &other);

        remove_member(&mut store, &SERVICES, c1, 11).await.unwrap();
        reposition_member(&mut store, &SERVICES, c1, 13, 1).await.unwrap();
        reorder_scope(
            &mut store,
            &SERVICES,
            c1,
            &[12, 13],
            ReorderStrategy::TwoPhase,
        )
        .await
        .unwrap();
        store.commit().unwrap();

        assert_eq!(store.ids(&SERVICES, c1), vec![12, 13]);
        assert_eq!(store.orders(&SERVICES, c2), other);
        assert!(store.history(&SERVICES, c2).is_empty());
    }

    #[tokio::test]
    async fn test_transfer_keeps_both_scopes_dense() {
        let c1 = ScopeKey::Category(1);
        let c2 = ScopeKey::Category(2);
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, c1, &[(11, 1), (12, 2), (13, 3)])
            .with_members(&SERVICES, c2, &[(21, 1), (22, 2)]);

        let transfer = transfer_member(&mut store, &SERVICES, c1, c2, 11, Some(2)).await.unwrap();
        store.commit().unwrap();

        assert_eq!(transfer.order, 2);
        assert_eq!(store.ids(&SERVICES, c1), vec![12, 13]);
        assert_eq!(store.ids(&SERVICES, c2), vec![21, 11, 22]);
        assert!(is_dense(&store.orders(&SERVICES, c1)));
        assert!(is_dense(&store.orders(&SERVICES, c2)));
        assert_eq!(transfer.source.assignments.len(), 2);
    }

    #[tokio::test]
    async fn test_transfer_appends_by_default() {
        let c1 = ScopeKey::Category(5);
        let c2 = ScopeKey::Category(3);
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, c1, &[(51, 1), (52, 2)])
            .with_members(&SERVICES, c2, &[(31, 1)]);
        let transfer = transfer_member(&mut store, &SERVICES, c1, c2, 51, None).await.unwrap();
        assert_eq!(transfer.order, 2);
        assert_eq!(store.ids(&SERVICES, c2), vec![31, 51]);
        assert_eq!(store.orders(&SERVICES, c1), vec![(52, 1)]);
    }

    #[tokio::test]
    async fn test_member_moved_while_locking_is_retried() {
        let c1 = ScopeKey::Category(1);
        let c2 = ScopeKey::Category(2);
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, c1, &[(11, 1)])
            .with_members(&SERVICES, c2, &[(21, 1), (22, 2)])
            .move_on_next_lock(11, c2, 3);

        let first = lock_member_scope(&mut store, &SERVICES, 11, None).await.unwrap();
        assert_eq!(first, MemberScope::Moved);
        store.rollback();

        // the concurrent move was committed, so the retry sees the new scope
        let second = lock_member_scope(&mut store, &SERVICES, 11, None).await.unwrap();
        assert_eq!(second, MemberScope::Locked(c2));
        remove_member(&mut store, &SERVICES, c2, 11).await.unwrap();
        store.commit().unwrap();
        assert_eq!(store.orders(&SERVICES, c2), vec![(21, 1), (22, 2)]);
        assert!(store.ids(&SERVICES, c1).is_empty());
    }

    #[tokio::test]
    async fn test_lock_member_scope_locks_both_scopes_in_key_order() {
        let c1 = ScopeKey::Category(1);
        let c4 = ScopeKey::Category(4);
        let mut store = MemoryOrderStore::new()
            .with_members(&SERVICES, c1, &[(11, 1)])
            .with_members(&SERVICES, c4, &[(41, 1)]);

        let locked = lock_member_scope(&mut store, &SERVICES, 41, Some(c1)).await.unwrap();
        assert_eq!(locked, MemberScope::Locked(c4));
        assert_eq!(store.lock_order(), vec![c1, c4]);

        let same = lock_member_scope(&mut store, &SERVICES, 11, Some(c1)).await.unwrap();
        assert_eq!(same, MemberScope::Locked(c1));
        assert_eq!(store.lock_order(), vec![c1, c4, c1]);
    }

    #[tokio::test]
    async fn test_lock_member_scope_missing_member() {
        let mut store =
            MemoryOrderStore::new().with_members(&SERVICES, ScopeKey::Category(1), &[(11, 1)]);
        let missing = lock_member_scope(&mut store, &SERVICES, 99, None).await.unwrap();
        assert_eq!(missing, MemberScope::Missing);
        assert!(store.lock_order().is_empty());
    }

    #[tokio::test]
    async fn test_audit_reads_without_locking() {
        let mut store =
            MemoryOrderStore::new().with_members(&CATEGORIES, G, &[(1, 1), (2, 4), (3, 7)]);
        let report = audit_scope(&mut store, &CATEGORIES, G).await.unwrap();
        assert_eq!(report.gaps, vec![2, 3]);
        assert!(!store.locked(&CATEGORIES, G));
        assert_eq!(store.locking_reads(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_quarantined_scope_is_repaired_before_operation() {
        // left over by an interrupted legacy reorder
        let mut store =
            MemoryOrderStore::new().with_members(&FAQ_ITEMS, G, &[(1, -2), (2, -1), (3, 3)]);
        let placement = place_new_member(&mut store, &FAQ_ITEMS, G, None).await.unwrap();
        assert!(placement.change.repaired);
        assert_eq!(placement.order, 4);
        assert_eq!(store.orders(&FAQ_ITEMS, G), vec![(2, 1), (1, 2), (3, 3)]);
    }

    #[tokio::test]
    async fn test_repair_scope_reports_previous_state() {
        let mut store =
            MemoryOrderStore::new().with_members(&CATEGORIES, G, &[(1, 1), (2, 4), (3, 7)]);
        let repair = repair_scope(&mut store, &CATEGORIES, G).await.unwrap();
        assert_eq!(repair.report.state, ScopeState::Unknown);
        assert_eq!(repair.report.gaps, vec![2, 3]);
        assert_eq!(store.orders(&CATEGORIES, G), vec![(1, 1), (2, 2), (3, 3)]);

        let again = repair_scope(&mut store, &CATEGORIES, G).await.unwrap();
        assert!(again.report.is_consistent());
        assert!(again.assignments.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_scope_for_table_fails() {
        let mut store = MemoryOrderStore::new();
        let err = place_new_member(&mut store, &SERVICES, G, None).await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn test_density_under_mixed_operations() {
        let mut store = MemoryOrderStore::new();
        let mut next_id = 100;
        // deterministic mix of creates, moves and deletes
        for step in 0..40i64 {
            let ids = store.ids(&FAQ_ITEMS, G);
            let n = ids.len() as i32;
            match step % 5 {
                0 | 1 => {
                    next_id += 1;
                    let target = if step % 2 == 0 {
                        None
                    } else {
                        Some((step as i32 % (n + 2)) + 1)
                    };
                    create(&mut store, G, next_id, target).await;
                }
                2 if n > 1 => {
                    let id = ids[(step as usize * 7) % ids.len()];
                    let to = (step as i32 * 3) % n + 1;
                    reposition_member(&mut store, &FAQ_ITEMS, G, id, to).await.unwrap();
                    store.commit().unwrap();
                }
                3 if n > 2 => {
                    let id = ids[(step as usize * 5) % ids.len()];
                    remove_member(&mut store, &FAQ_ITEMS, G, id).await.unwrap();
                    store.commit().unwrap();
                }
                4 if n > 1 => {
                    let mut reversed = ids.clone();
                    reversed.reverse();
                    reorder_scope(
                        &mut store,
                        &FAQ_ITEMS,
                        G,
                        &reversed,
                        ReorderStrategy::TwoPhase,
                    )
                    .await
                    .unwrap();
                    store.commit().unwrap();
                }
                _ => {}
            }
            let orders = store.orders(&FAQ_ITEMS, G);
            assert!(is_dense(&orders), "not dense after step {step}");
        }
        assert!(store.history(&FAQ_ITEMS, G).iter().all(|s| no_duplicates(s)));
    }
}
