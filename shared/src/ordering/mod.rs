//! Dense display-order management
//!
//! Every ordered entity (FAQ item, category, service) lives in a *scope*:
//! FAQ items and categories share one global scope per table, services are
//! scoped by their parent category. Between operations the `display_order`
//! values of a scope are exactly `1..=N`.
//!
//! This module is storage-agnostic:
//! - [`sequencer`] computes the writes for append / insert / delete /
//!   reposition / bulk reorder, emitted in an order that never puts two rows
//!   of a scope on the same value.
//! - [`audit`] classifies a scope and plans a renumbering for broken ones.
//!
//! Applying plans against a store is the server's job.

pub mod audit;
mod error;
pub mod sequencer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use audit::{ScopeReport, ScopeState, inspect, plan_repair};
pub use error::OrderingError;
pub use sequencer::{BulkPlan, DeletePlan, InsertPlan, RepositionPlan, Shift};

/// Reserved slot a moving member is parked on during a reposition.
///
/// Never a valid position and never a quarantine placeholder.
pub const PARKING_SLOT: i32 = 0;

/// Scope discriminator for an ordered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeKey {
    /// The single scope of an unscoped table (FAQ items, categories)
    Global,
    /// Services belonging to one category
    Category(i64),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Global => write!(f, "global"),
            ScopeKey::Category(id) => write!(f, "category:{id}"),
        }
    }
}

/// Kind of ordered entity, one per ordered table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderedKind {
    FaqItem,
    Category,
    Service,
}

impl OrderedKind {
    pub const ALL: [OrderedKind; 3] = [Self::FaqItem, Self::Category, Self::Service];

    /// Whether members of this kind are scoped by a parent category
    pub fn is_category_scoped(&self) -> bool {
        matches!(self, OrderedKind::Service)
    }

    /// Check that a scope key is valid for this kind
    pub fn accepts(&self, scope: ScopeKey) -> bool {
        match scope {
            ScopeKey::Global => !self.is_category_scoped(),
            ScopeKey::Category(_) => self.is_category_scoped(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderedKind::FaqItem => "faq_item",
            OrderedKind::Category => "category",
            OrderedKind::Service => "service",
        }
    }
}

impl fmt::Display for OrderedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `(id, display_order)` pair of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderSlot {
    pub id: i64,
    pub display_order: i32,
}

impl OrderSlot {
    pub const fn new(id: i64, display_order: i32) -> Self {
        Self { id, display_order }
    }
}

/// The rows of one scope as loaded inside the current transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSnapshot {
    pub scope: ScopeKey,
    /// Sorted by `(display_order, id)`
    pub slots: Vec<OrderSlot>,
}

impl ScopeSnapshot {
    pub fn new(scope: ScopeKey, mut slots: Vec<OrderSlot>) -> Self {
        slots.sort_by_key(|s| (s.display_order, s.id));
        Self { scope, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Member count as a display order
    pub fn max_order(&self) -> i32 {
        i32::try_from(self.slots.len()).unwrap_or(i32::MAX)
    }

    pub fn order_of(&self, id: i64) -> Option<i32> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.display_order)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.slots.iter().any(|s| s.id == id)
    }

    /// Ids in display order
    pub fn ids(&self) -> Vec<i64> {
        self.slots.iter().map(|s| s.id).collect()
    }

    /// Snapshot with one member taken out
    pub fn without(&self, id: i64) -> Self {
        Self {
            scope: self.scope,
            slots: self.slots.iter().copied().filter(|s| s.id != id).collect(),
        }
    }
}

/// How a bulk reorder is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderStrategy {
    /// Defer the unique constraint to commit and write all values in one statement,
    /// falling back to two-phase when the store cannot defer
    #[default]
    Deferred,
    /// Quarantine every row on a negative placeholder, then write final values
    TwoPhase,
}

impl FromStr for ReorderStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(Self::Deferred),
            "two_phase" | "two-phase" => Ok(Self::TwoPhase),
            other => Err(format!(
                "unknown reorder strategy '{other}' (expected deferred or two_phase)"
            )),
        }
    }
}

impl fmt::Display for ReorderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReorderStrategy::Deferred => f.write_str("deferred"),
            ReorderStrategy::TwoPhase => f.write_str("two_phase"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_serde_shape() {
        let json = serde_json::to_value(ScopeKey::Category(7)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "category", "id": 7}));
        let global: ScopeKey = serde_json::from_str(r#"{"kind":"global"}"#).unwrap();
        assert_eq!(global, ScopeKey::Global);
    }

    #[test]
    fn kind_accepts_matching_scope_only() {
        assert!(OrderedKind::FaqItem.accepts(ScopeKey::Global));
        assert!(!OrderedKind::Category.accepts(ScopeKey::Category(1)));
        assert!(OrderedKind::Service.accepts(ScopeKey::Category(1)));
        assert!(!OrderedKind::Service.accepts(ScopeKey::Global));
    }

    #[test]
    fn snapshot_sorts_by_order_then_id() {
        let snap = ScopeSnapshot::new(
            ScopeKey::Global,
            vec![
                OrderSlot::new(30, 2),
                OrderSlot::new(20, 1),
                OrderSlot::new(10, 2),
            ],
        );
        assert_eq!(snap.ids(), vec![20, 10, 30]);
        assert_eq!(snap.order_of(30), Some(2));
        assert_eq!(snap.without(10).ids(), vec![20, 30]);
    }

    #[test]
    fn strategy_parse() {
        assert_eq!("deferred".parse(), Ok(ReorderStrategy::Deferred));
        assert_eq!("TWO_PHASE".parse(), Ok(ReorderStrategy::TwoPhase));
        assert!("shuffle".parse::<ReorderStrategy>().is_err());
    }
}
