//! In-memory [`OrderStore`] for engine tests
//!
//! Behaves like one PostgreSQL transaction over the ordered tables:
//! - `UNIQUE (table, scope, display_order)` is checked after every write,
//!   or at [`MemoryOrderStore::commit`] once uniqueness has been deferred
//! - [`MemoryOrderStore::rollback`] restores the last committed state
//! - the n-th write statement can be made to fail
//! - every intermediate scope state is recorded
//! - a concurrent move can be committed while a scope lock is awaited

use async_trait::async_trait;
use shared::ordering::{OrderSlot, ScopeKey};
use std::collections::{HashMap, HashSet};

use super::OrderedTable;
use super::store::{BoxError, OrderStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Row {
    table: &'static str,
    scope: ScopeKey,
    id: i64,
    order: i32,
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    committed: Vec<Row>,
    rows: Vec<Row>,
    deferrable: bool,
    deferred: bool,
    fail_at_write: Option<usize>,
    writes: usize,
    history: HashMap<(&'static str, ScopeKey), Vec<Vec<(i64, i32)>>>,
    locks: Vec<(&'static str, ScopeKey)>,
    locking_reads: usize,
    move_on_lock: Option<(i64, ScopeKey, i32)>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed committed rows without any uniqueness check
    pub fn with_members(
        mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        members: &[(i64, i32)],
    ) -> Self {
        for (id, order) in members {
            self.rows.push(Row {
                table: table.name,
                scope,
                id: *id,
                order: *order,
            });
        }
        self.committed = self.rows.clone();
        self
    }

    /// Whether `defer_uniqueness` succeeds
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = deferrable;
        self
    }

    /// Fail the n-th write statement (1-based, counted from now)
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_at_write = Some(self.writes + n);
        self
    }

    /// Another transaction moves row `id` to `scope` at `order` and commits
    /// while the next scope lock is awaited
    pub fn move_on_next_lock(mut self, id: i64, scope: ScopeKey, order: i32) -> Self {
        self.move_on_lock = Some((id, scope, order));
        self
    }

    /// Insert a new row the way an entity INSERT would
    pub fn insert(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<(), BoxError> {
        self.next_write()?;
        self.check_unique(table.name, scope, id, order)?;
        self.rows.push(Row {
            table: table.name,
            scope,
            id,
            order,
        });
        self.record(table.name, scope);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), BoxError> {
        if self.deferred {
            let mut seen = HashSet::new();
            for row in &self.rows {
                if !seen.insert((row.table, row.scope, row.order)) {
                    return Err(format!(
                        "duplicate display_order {} in {} {} at commit",
                        row.order, row.table, row.scope
                    )
                    .into());
                }
            }
        }
        self.committed = self.rows.clone();
        self.deferred = false;
        Ok(())
    }

    pub fn rollback(&mut self) {
        self.rows = self.committed.clone();
        self.deferred = false;
    }

    /// `(id, order)` pairs of a scope sorted by order, as the open transaction sees them
    pub fn orders(&self, table: &OrderedTable, scope: ScopeKey) -> Vec<(i64, i32)> {
        let mut out: Vec<(i64, i32)> = self
            .rows
            .iter()
            .filter(|r| r.table == table.name && r.scope == scope)
            .map(|r| (r.id, r.order))
            .collect();
        out.sort_by_key(|(id, order)| (*order, *id));
        out
    }

    /// Ids of a scope in display order
    pub fn ids(&self, table: &OrderedTable, scope: ScopeKey) -> Vec<i64> {
        self.orders(table, scope).into_iter().map(|(id, _)| id).collect()
    }

    /// Scope states after each write to it
    pub fn history(&self, table: &OrderedTable, scope: ScopeKey) -> &[Vec<(i64, i32)>] {
        self.history
            .get(&(table.name, scope))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn locked(&self, table: &OrderedTable, scope: ScopeKey) -> bool {
        self.locks.contains(&(table.name, scope))
    }

    /// Scope locks in the order they were taken
    pub fn lock_order(&self) -> Vec<ScopeKey> {
        self.locks.iter().map(|(_, scope)| *scope).collect()
    }

    /// Number of `load_scope` calls, which lock rows in PostgreSQL
    pub fn locking_reads(&self) -> usize {
        self.locking_reads
    }

    fn slots(&self, table: &OrderedTable, scope: ScopeKey) -> Vec<OrderSlot> {
        self.orders(table, scope)
            .into_iter()
            .map(|(id, order)| OrderSlot::new(id, order))
            .collect()
    }

    fn next_write(&mut self) -> Result<(), BoxError> {
        self.writes += 1;
        if self.fail_at_write == Some(self.writes) {
            return Err(format!("injected failure on write {}", self.writes).into());
        }
        Ok(())
    }

    fn check_scope(table: &OrderedTable, scope: ScopeKey) -> Result<(), BoxError> {
        if table.kind.accepts(scope) {
            Ok(())
        } else {
            Err(format!("scope {scope} does not apply to table {}", table.name).into())
        }
    }

    fn check_unique(
        &self,
        table: &'static str,
        scope: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<(), BoxError> {
        if self.deferred {
            return Ok(());
        }
        let clash = self.rows.iter().any(|r| {
            r.table == table && r.scope == scope && r.id != id && r.order == order
        });
        if clash {
            return Err(format!("duplicate display_order {order} in {table} {scope}").into());
        }
        Ok(())
    }

    fn record(&mut self, table: &'static str, scope: ScopeKey) {
        let mut state: Vec<(i64, i32)> = self
            .rows
            .iter()
            .filter(|r| r.table == table && r.scope == scope)
            .map(|r| (r.id, r.order))
            .collect();
        state.sort_by_key(|(id, order)| (*order, *id));
        self.history.entry((table, scope)).or_default().push(state);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn lock_scope(&mut self, table: &OrderedTable, scope: ScopeKey) -> Result<(), BoxError> {
        Self::check_scope(table, scope)?;
        if let Some((id, to, order)) = self.move_on_lock.take() {
            for rows in [&mut self.rows, &mut self.committed] {
                if let Some(row) = rows.iter_mut().find(|r| r.table == table.name && r.id == id) {
                    row.scope = to;
                    row.order = order;
                }
            }
        }
        self.locks.push((table.name, scope));
        Ok(())
    }

    async fn load_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError> {
        Self::check_scope(table, scope)?;
        self.locking_reads += 1;
        Ok(self.slots(table, scope))
    }

    async fn read_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError> {
        Self::check_scope(table, scope)?;
        Ok(self.slots(table, scope))
    }

    async fn member_scope(
        &mut self,
        table: &OrderedTable,
        id: i64,
    ) -> Result<Option<ScopeKey>, BoxError> {
        Ok(self
            .rows
            .iter()
            .find(|r| r.table == table.name && r.id == id)
            .map(|r| r.scope))
    }

    async fn write_order(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError> {
        Self::check_scope(table, scope)?;
        self.next_write()?;
        let Some(index) = self
            .rows
            .iter()
            .position(|r| r.table == table.name && r.scope == scope && r.id == id)
        else {
            return Ok(false);
        };
        self.check_unique(table.name, scope, id, order)?;
        self.rows[index].order = order;
        self.record(table.name, scope);
        Ok(true)
    }

    async fn defer_uniqueness(&mut self, _table: &OrderedTable) -> Result<bool, BoxError> {
        if self.deferrable {
            self.deferred = true;
        }
        Ok(self.deferrable)
    }

    async fn remove_member(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
    ) -> Result<Option<i32>, BoxError> {
        Self::check_scope(table, scope)?;
        self.next_write()?;
        let Some(index) = self
            .rows
            .iter()
            .position(|r| r.table == table.name && r.scope == scope && r.id == id)
        else {
            return Ok(None);
        };
        let row = self.rows.remove(index);
        self.record(table.name, scope);
        Ok(Some(row.order))
    }

    async fn relocate_member(
        &mut self,
        table: &OrderedTable,
        from: ScopeKey,
        to: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError> {
        Self::check_scope(table, from)?;
        Self::check_scope(table, to)?;
        self.next_write()?;
        let Some(index) = self
            .rows
            .iter()
            .position(|r| r.table == table.name && r.scope == from && r.id == id)
        else {
            return Ok(false);
        };
        self.check_unique(table.name, to, id, order)?;
        self.rows[index].scope = to;
        self.rows[index].order = order;
        self.record(table.name, from);
        self.record(table.name, to);
        Ok(true)
    }
}
