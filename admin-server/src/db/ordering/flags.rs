//! Registry of scopes whose last bulk reorder failed
//!
//! The failed transaction has already rolled back, so the scope itself is
//! fine; the flag tells the admin UI its cached order is stale and must be
//! reloaded. Process-local, cleared by the next successful operation.

use dashmap::DashMap;
use serde::Serialize;
use shared::ordering::{OrderedKind, ScopeKey};
use std::sync::Arc;

struct ScopeFlag {
    reason: String,
    flagged_at: i64,
}

/// Flagged scope as reported by the audit endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedScope {
    pub kind: OrderedKind,
    pub scope: ScopeKey,
    pub reason: String,
    pub flagged_at: i64,
}

#[derive(Clone, Default)]
pub struct ScopeFlags {
    entries: Arc<DashMap<(OrderedKind, ScopeKey), ScopeFlag>>,
}

impl ScopeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self, kind: OrderedKind, scope: ScopeKey, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(kind = %kind, scope = %scope, reason = %reason, "Scope flagged for reload");
        self.entries.insert(
            (kind, scope),
            ScopeFlag {
                reason,
                flagged_at: shared::util::now_millis(),
            },
        );
    }

    pub fn clear(&self, kind: OrderedKind, scope: ScopeKey) {
        if self.entries.remove(&(kind, scope)).is_some() {
            tracing::info!(kind = %kind, scope = %scope, "Scope flag cleared");
        }
    }

    #[cfg(test)]
    fn is_flagged(&self, kind: OrderedKind, scope: ScopeKey) -> bool {
        self.entries.contains_key(&(kind, scope))
    }

    /// All flagged scopes, oldest first
    pub fn list(&self) -> Vec<FlaggedScope> {
        let mut out: Vec<FlaggedScope> = self
            .entries
            .iter()
            .map(|entry| {
                let (kind, scope) = *entry.key();
                FlaggedScope {
                    kind,
                    scope,
                    reason: entry.value().reason.clone(),
                    flagged_at: entry.value().flagged_at,
                }
            })
            .collect();
        out.sort_by_key(|f| (f.flagged_at, f.kind, f.scope));
        out
    }
}
