//! FAQ items, ordered in one global scope

use shared::error::{AppError, ErrorCode};
use shared::models::{FaqItem, FaqItemCreate, FaqItemUpdate};
use shared::ordering::ScopeKey;
use sqlx::{PgConnection, PgPool};

use super::{Outcome, Removed, bulk_reorder};
use crate::db::ordering::engine::{self, ScopeChange};
use crate::db::ordering::{FAQ_ITEMS, OrderingContext, PgOrderStore};
use crate::error::ServiceResult;

const SCOPE: ScopeKey = ScopeKey::Global;

pub async fn list(pool: &PgPool) -> ServiceResult<Vec<FaqItem>> {
    let rows = sqlx::query_as::<_, FaqItem>(
        r#"
        SELECT id, title, content, display_order, created_at, updated_at FROM faq_items
        ORDER BY display_order, id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn fetch(conn: &mut PgConnection, id: i64) -> ServiceResult<FaqItem> {
    sqlx::query_as::<_, FaqItem>(
        r#"
        SELECT id, title, content, display_order, created_at, updated_at FROM faq_items
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::new(ErrorCode::FaqItemNotFound).with_detail("id", id).into())
}

pub async fn get(pool: &PgPool, id: i64) -> ServiceResult<FaqItem> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

/// Create an item, appended unless `display_order` names a position
pub async fn create(ctx: &OrderingContext, data: FaqItemCreate) -> ServiceResult<Outcome<FaqItem>> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();

    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    let placement = engine::place_new_member(&mut store, &FAQ_ITEMS, SCOPE, data.display_order)
        .await
        .map_err(|e| FAQ_ITEMS.error(e))?;

    let item = sqlx::query_as::<_, FaqItem>(
        r#"
        INSERT INTO faq_items (id, title, content, display_order, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING id, title, content, display_order, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(data.title.trim())
    .bind(&data.content)
    .bind(placement.order)
    .bind(now)
    .fetch_one(store.conn())
    .await?;

    engine::ensure_dense(&mut store, &FAQ_ITEMS, SCOPE)
        .await
        .map_err(|e| FAQ_ITEMS.error(e))?;
    tx.commit().await?;
    ctx.succeeded(&FAQ_ITEMS, SCOPE);

    tracing::info!(id, order = item.display_order, "FAQ item created");
    Ok(Outcome::new(item, vec![placement.change]))
}

/// Update fields and optionally move the item to `display_order`
pub async fn update(
    ctx: &OrderingContext,
    id: i64,
    data: FaqItemUpdate,
) -> ServiceResult<Outcome<FaqItem>> {
    let now = shared::util::now_millis();

    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    let mut changes = Vec::new();
    if let Some(order) = data.display_order {
        let change = engine::reposition_member(&mut store, &FAQ_ITEMS, SCOPE, id, order)
            .await
            .map_err(|e| FAQ_ITEMS.error(e))?;
        changes.push(change);
    }

    let result = sqlx::query(
        r#"
        UPDATE faq_items
        SET title = COALESCE($1, title), content = COALESCE($2, content), updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(data.title.as_deref().map(str::trim))
    .bind(data.content.as_deref())
    .bind(now)
    .bind(id)
    .execute(store.conn())
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::FaqItemNotFound)
            .with_detail("id", id)
            .into());
    }

    let item = fetch(store.conn(), id).await?;
    tx.commit().await?;
    ctx.succeeded(&FAQ_ITEMS, SCOPE);

    Ok(Outcome::new(item, changes))
}

/// Delete an item and close the gap
pub async fn delete(ctx: &OrderingContext, id: i64) -> ServiceResult<Removed> {
    let mut tx = ctx.pool.begin().await?;
    let change = engine::remove_member(&mut PgOrderStore::new(&mut *tx), &FAQ_ITEMS, SCOPE, id)
        .await
        .map_err(|e| FAQ_ITEMS.error(e))?;
    tx.commit().await?;
    ctx.succeeded(&FAQ_ITEMS, SCOPE);

    tracing::info!(id, "FAQ item deleted");
    Ok(Removed { id, change })
}

/// Replace the order of all items
pub async fn reorder(ctx: &OrderingContext, ordered_ids: &[i64]) -> ServiceResult<ScopeChange> {
    bulk_reorder(ctx, &FAQ_ITEMS, SCOPE, ordered_ids).await
}
