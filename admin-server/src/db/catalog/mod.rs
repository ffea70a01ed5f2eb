//! Entity facades for the ordered catalog
//!
//! Each facade fixes the scope of its entity kind and runs every logical
//! operation in one transaction:
//!
//! ```text
//! begin → engine step(s) on PgOrderStore → entity statements → ensure_dense → commit
//! ```
//!
//! Results carry the entity plus every `(id, display_order)` the operation wrote.

pub mod audit;
pub mod category;
pub mod faq;
pub mod service;

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::ordering::{OrderingError, ScopeKey};
use sqlx::PgConnection;

use crate::db::ordering::engine::{self, ScopeChange};
use crate::db::ordering::{OrderedTable, OrderingContext, PgOrderStore};
use crate::error::ServiceResult;

/// Entity after a mutating operation, with the order changes it caused
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub item: T,
    pub changes: Vec<ScopeChange>,
}

impl<T> Outcome<T> {
    pub fn new(item: T, changes: Vec<ScopeChange>) -> Self {
        Self { item, changes }
    }
}

/// Deleted entity id, with the compaction it caused
#[derive(Debug, Clone, Serialize)]
pub struct Removed {
    pub id: i64,
    pub change: ScopeChange,
}

/// Replace a scope's order in its own transaction
///
/// Store failures, including a failed commit, flag the scope for reload.
pub(crate) async fn bulk_reorder(
    ctx: &OrderingContext,
    table: &OrderedTable,
    scope: ScopeKey,
    ordered_ids: &[i64],
) -> ServiceResult<ScopeChange> {
    let store_failure = |e: sqlx::Error| OrderingError::StoreFailure {
        scope,
        message: e.to_string(),
    };

    let result = async {
        let mut tx = ctx.pool.begin().await.map_err(store_failure)?;
        let change = engine::reorder_scope(
            &mut PgOrderStore::new(&mut *tx),
            table,
            scope,
            ordered_ids,
            ctx.strategy,
        )
        .await?;
        tx.commit().await.map_err(store_failure)?;
        Ok::<_, OrderingError>(change)
    }
    .await;

    ctx.track(table, scope, true, &result);
    result.map_err(|e| table.error(e).into())
}

/// Check that every id names an existing game
async fn ensure_games_exist(conn: &mut PgConnection, game_ids: &[i64]) -> ServiceResult<()> {
    if game_ids.is_empty() {
        return Ok(());
    }
    let found: Vec<(i64,)> = sqlx::query_as("SELECT id FROM games WHERE id = ANY($1)")
        .bind(game_ids)
        .fetch_all(&mut *conn)
        .await?;
    let missing: Vec<i64> = game_ids
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(f,)| f == id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::new(ErrorCode::GameNotFound)
            .with_detail("game_ids", missing)
            .into());
    }
    Ok(())
}

/// Replace the game associations of a category or service
pub(crate) async fn replace_game_links(
    conn: &mut PgConnection,
    junction: &str,
    owner_column: &str,
    owner_id: i64,
    game_ids: &[i64],
) -> ServiceResult<()> {
    let mut game_ids = game_ids.to_vec();
    game_ids.sort_unstable();
    game_ids.dedup();
    ensure_games_exist(conn, &game_ids).await?;

    sqlx::query(&format!("DELETE FROM {junction} WHERE {owner_column} = $1"))
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    if !game_ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {junction} ({owner_column}, game_id) \
             SELECT $1, * FROM UNNEST($2::bigint[])"
        ))
        .bind(owner_id)
        .bind(&game_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Game ids per owner, for a batch of owners
pub(crate) async fn load_game_links(
    conn: &mut PgConnection,
    junction: &str,
    owner_column: &str,
    owner_ids: &[i64],
) -> ServiceResult<Vec<(i64, i64)>> {
    if owner_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<(i64, i64)> = sqlx::query_as(&format!(
        "SELECT {owner_column}, game_id FROM {junction} \
         WHERE {owner_column} = ANY($1) ORDER BY game_id"
    ))
    .bind(owner_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
