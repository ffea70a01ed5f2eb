//! Display-order persistence
//!
//! - [`store`]: the scoped store adapter ([`OrderStore`]) and its PostgreSQL implementation
//! - [`engine`]: applies sequencer plans through a store inside one transaction
//! - [`flags`]: in-process registry of scopes whose last bulk reorder failed
//!
//! Every mutating operation locks its scope, loads it, renumbers it first if it
//! is not dense, and checks density again before the caller commits.

pub mod engine;
pub mod flags;
pub mod store;

#[cfg(test)]
pub mod memory;

use shared::error::{AppError, ErrorCode};
use shared::ordering::{OrderedKind, OrderingError, ReorderStrategy, ScopeKey};
use sqlx::PgPool;

pub use flags::ScopeFlags;
pub use store::{OrderStore, PgOrderStore};

/// Table holding one kind of ordered entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedTable {
    pub kind: OrderedKind,
    pub name: &'static str,
    /// Column holding the scope id; `None` for globally ordered tables
    pub scope_column: Option<&'static str>,
    /// Name of the `UNIQUE (scope, display_order)` constraint
    pub order_constraint: &'static str,
    pub not_found: ErrorCode,
}

pub const FAQ_ITEMS: OrderedTable = OrderedTable {
    kind: OrderedKind::FaqItem,
    name: "faq_items",
    scope_column: None,
    order_constraint: "faq_items_display_order_key",
    not_found: ErrorCode::FaqItemNotFound,
};

pub const CATEGORIES: OrderedTable = OrderedTable {
    kind: OrderedKind::Category,
    name: "categories",
    scope_column: None,
    order_constraint: "categories_display_order_key",
    not_found: ErrorCode::CategoryNotFound,
};

pub const SERVICES: OrderedTable = OrderedTable {
    kind: OrderedKind::Service,
    name: "services",
    scope_column: Some("category_id"),
    order_constraint: "services_category_display_order_key",
    not_found: ErrorCode::ServiceNotFound,
};

impl OrderedTable {
    pub fn for_kind(kind: OrderedKind) -> &'static OrderedTable {
        match kind {
            OrderedKind::FaqItem => &FAQ_ITEMS,
            OrderedKind::Category => &CATEGORIES,
            OrderedKind::Service => &SERVICES,
        }
    }

    /// Map an ordering failure to the API error, using this table's not-found code
    pub fn error(&self, err: OrderingError) -> AppError {
        match err {
            OrderingError::NotFound { id, .. } => {
                AppError::new(self.not_found).with_detail("id", id)
            }
            other => other.into(),
        }
    }
}

/// Everything the entity facades need to run an ordering operation
#[derive(Clone)]
pub struct OrderingContext {
    pub pool: PgPool,
    pub strategy: ReorderStrategy,
    pub flags: ScopeFlags,
}

impl OrderingContext {
    pub fn new(pool: PgPool, strategy: ReorderStrategy) -> Self {
        Self {
            pool,
            strategy,
            flags: ScopeFlags::new(),
        }
    }

    /// A committed operation left the scope dense
    pub fn succeeded(&self, table: &OrderedTable, scope: ScopeKey) {
        self.flags.clear(table.kind, scope);
    }

    /// Record the outcome of an operation on a scope
    ///
    /// A store failure during a bulk reorder flags the scope so the UI knows to
    /// reload; any later success clears it.
    pub fn track<T>(
        &self,
        table: &OrderedTable,
        scope: ScopeKey,
        bulk: bool,
        result: &Result<T, OrderingError>,
    ) {
        match result {
            Ok(_) => self.succeeded(table, scope),
            Err(err) if bulk && err.is_store_failure() => {
                self.flags.flag(table.kind, scope, err.to_string())
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_services_are_scoped() {
        assert!(FAQ_ITEMS.scope_column.is_none());
        assert!(CATEGORIES.scope_column.is_none());
        assert_eq!(SERVICES.scope_column, Some("category_id"));
        for kind in OrderedKind::ALL {
            assert_eq!(OrderedTable::for_kind(kind).kind, kind);
        }
    }

    #[test]
    fn not_found_uses_entity_code() {
        let err = SERVICES.error(OrderingError::NotFound {
            scope: ScopeKey::Category(2),
            id: 11,
        });
        assert_eq!(err.code, ErrorCode::ServiceNotFound);

        let err = FAQ_ITEMS.error(OrderingError::OutOfRange {
            scope: ScopeKey::Global,
            requested: 0,
            max: 3,
        });
        assert_eq!(err.code, ErrorCode::OrderOutOfRange);
    }
}
