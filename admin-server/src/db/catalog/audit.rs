//! Scope audit and repair across all ordered tables

use serde::Serialize;
use shared::error::AppError;
use shared::ordering::{OrderedKind, OrderingError, ScopeKey, ScopeReport};

use crate::db::ordering::engine::{self, Repair};
use crate::db::ordering::flags::FlaggedScope;
use crate::db::ordering::{OrderedTable, OrderingContext, PgOrderStore};
use crate::error::ServiceResult;

#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: OrderedKind,
    #[serde(flatten)]
    pub report: ScopeReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub scopes: Vec<KindReport>,
    /// Scopes whose last bulk reorder failed
    pub flagged: Vec<FlaggedScope>,
}

impl AuditReport {
    pub fn inconsistent(&self) -> impl Iterator<Item = &KindReport> {
        self.scopes.iter().filter(|s| !s.report.is_consistent())
    }
}

/// Inspect every scope: FAQ items, categories, and each category's services
pub async fn audit_all(ctx: &OrderingContext) -> ServiceResult<AuditReport> {
    let mut tx = ctx.pool.begin().await?;
    // one snapshot for every scope; row locks fail in a read-only transaction
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    let category_ids: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM categories ORDER BY display_order, id")
            .fetch_all(&mut *tx)
            .await?;

    let mut targets: Vec<(OrderedKind, ScopeKey)> = vec![
        (OrderedKind::FaqItem, ScopeKey::Global),
        (OrderedKind::Category, ScopeKey::Global),
    ];
    targets.extend(
        category_ids
            .into_iter()
            .map(|(id,)| (OrderedKind::Service, ScopeKey::Category(id))),
    );

    let mut store = PgOrderStore::new(&mut *tx);
    let mut scopes = Vec::with_capacity(targets.len());
    for (kind, scope) in targets {
        let table = OrderedTable::for_kind(kind);
        let report = engine::audit_scope(&mut store, table, scope)
            .await
            .map_err(AppError::from)?;
        scopes.push(KindReport { kind, report });
    }
    tx.rollback().await?;

    let report = AuditReport {
        scopes,
        flagged: ctx.flags.list(),
    };
    let broken = report.inconsistent().count();
    if broken > 0 {
        tracing::warn!(broken, "Audit found inconsistent scopes");
    }
    Ok(report)
}

/// Renumber one scope if it is not dense
pub async fn repair(
    ctx: &OrderingContext,
    kind: OrderedKind,
    scope: ScopeKey,
) -> ServiceResult<Repair> {
    let table = OrderedTable::for_kind(kind);
    if !kind.accepts(scope) {
        return Err(AppError::invalid_request(format!("Scope {scope} does not apply to {kind}"))
            .with_detail("kind", kind.name())
            .into());
    }

    let result = async {
        let store_failure = |e: sqlx::Error| OrderingError::StoreFailure {
            scope,
            message: e.to_string(),
        };
        let mut tx = ctx.pool.begin().await.map_err(store_failure)?;
        let repair = engine::repair_scope(&mut PgOrderStore::new(&mut *tx), table, scope).await?;
        tx.commit().await.map_err(store_failure)?;
        Ok::<_, OrderingError>(repair)
    }
    .await;

    ctx.track(table, scope, true, &result);
    let repair = result.map_err(|e| table.error(e))?;
    tracing::info!(
        kind = %kind,
        scope = %scope,
        renumbered = repair.assignments.len(),
        "Scope repair finished"
    );
    Ok(repair)
}
