//! Categories, ordered in one global scope
//!
//! Each category is also the scope of its services. Deleting a category
//! cascades to its services, so that whole service scope disappears with it.

use std::collections::HashMap;

use shared::error::{AppError, ErrorCode};
use shared::models::{Category, CategoryCreate, CategoryUpdate};
use shared::ordering::ScopeKey;
use sqlx::{PgConnection, PgPool};

use super::{Outcome, Removed, bulk_reorder, load_game_links, replace_game_links};
use crate::db::ordering::engine::{self, ScopeChange};
use crate::db::ordering::{CATEGORIES, OrderStore, OrderingContext, PgOrderStore, SERVICES};
use crate::error::ServiceResult;

const SCOPE: ScopeKey = ScopeKey::Global;

const COLUMNS: &str = "id, name, description, icon, display_order, created_at";

async fn attach_games(conn: &mut PgConnection, categories: &mut [Category]) -> ServiceResult<()> {
    let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
    let mut links: HashMap<i64, Vec<i64>> = HashMap::new();
    let rows = load_game_links(conn, "category_games", "category_id", &ids).await?;
    for (category_id, game_id) in rows {
        links.entry(category_id).or_default().push(game_id);
    }
    for category in categories {
        category.game_ids = links.remove(&category.id).unwrap_or_default();
    }
    Ok(())
}

pub async fn list(pool: &PgPool) -> ServiceResult<Vec<Category>> {
    let mut conn = pool.acquire().await?;
    let mut categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT {COLUMNS} FROM categories ORDER BY display_order, id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    attach_games(&mut *conn, &mut categories).await?;
    Ok(categories)
}

async fn fetch(conn: &mut PgConnection, id: i64) -> ServiceResult<Category> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::new(ErrorCode::CategoryNotFound).with_detail("id", id))?;
    let mut categories = [category];
    attach_games(conn, &mut categories).await?;
    let [category] = categories;
    Ok(category)
}

pub async fn get(pool: &PgPool, id: i64) -> ServiceResult<Category> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

/// Fail with `CategoryNotFound` unless the category exists; blocks its
/// deletion until the transaction ends
pub(crate) async fn ensure_exists(conn: &mut PgConnection, id: i64) -> ServiceResult<()> {
    let found: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM categories WHERE id = $1 FOR KEY SHARE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    if found.is_none() {
        return Err(AppError::new(ErrorCode::CategoryNotFound)
            .with_detail("id", id)
            .into());
    }
    Ok(())
}

/// Create a category, appended unless `display_order` names a position
pub async fn create(
    ctx: &OrderingContext,
    data: CategoryCreate,
) -> ServiceResult<Outcome<Category>> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();

    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    let placement = engine::place_new_member(&mut store, &CATEGORIES, SCOPE, data.display_order)
        .await
        .map_err(|e| CATEGORIES.error(e))?;

    sqlx::query(
        r#"
        INSERT INTO categories (id, name, description, icon, display_order, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(data.name.trim())
    .bind(&data.description)
    .bind(&data.icon)
    .bind(placement.order)
    .bind(now)
    .execute(store.conn())
    .await?;
    replace_game_links(
        store.conn(),
        "category_games",
        "category_id",
        id,
        &data.game_ids,
    )
    .await?;

    engine::ensure_dense(&mut store, &CATEGORIES, SCOPE)
        .await
        .map_err(|e| CATEGORIES.error(e))?;
    let category = fetch(store.conn(), id).await?;
    tx.commit().await?;
    ctx.succeeded(&CATEGORIES, SCOPE);

    tracing::info!(id, order = category.display_order, "Category created");
    Ok(Outcome::new(category, vec![placement.change]))
}

/// Update fields and optionally move the category to `display_order`
pub async fn update(
    ctx: &OrderingContext,
    id: i64,
    data: CategoryUpdate,
) -> ServiceResult<Outcome<Category>> {
    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    let mut changes = Vec::new();
    if let Some(order) = data.display_order {
        changes.push(
            engine::reposition_member(&mut store, &CATEGORIES, SCOPE, id, order)
                .await
                .map_err(|e| CATEGORIES.error(e))?,
        );
    }

    let result = sqlx::query(
        r#"
        UPDATE categories
        SET name = COALESCE($1, name), description = COALESCE($2, description),
            icon = COALESCE($3, icon)
        WHERE id = $4
        "#,
    )
    .bind(data.name.as_deref().map(str::trim))
    .bind(data.description.as_deref())
    .bind(data.icon.as_deref())
    .bind(id)
    .execute(store.conn())
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::new(ErrorCode::CategoryNotFound)
            .with_detail("id", id)
            .into());
    }

    if let Some(ref game_ids) = data.game_ids {
        replace_game_links(store.conn(), "category_games", "category_id", id, game_ids).await?;
    }

    let category = fetch(store.conn(), id).await?;
    tx.commit().await?;
    ctx.succeeded(&CATEGORIES, SCOPE);
    Ok(Outcome::new(category, changes))
}

/// Delete a category with all of its services, then close the gap
pub async fn delete(ctx: &OrderingContext, id: i64) -> ServiceResult<Removed> {
    let services = ScopeKey::Category(id);

    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    // Service writers of this category must finish before the cascade.
    store.lock_scope(&SERVICES, services).await?;
    let change = engine::remove_member(&mut store, &CATEGORIES, SCOPE, id)
        .await
        .map_err(|e| CATEGORIES.error(e))?;
    tx.commit().await?;

    ctx.succeeded(&CATEGORIES, SCOPE);
    ctx.flags.clear(SERVICES.kind, services);

    tracing::info!(id, "Category deleted with its services");
    Ok(Removed { id, change })
}

/// Replace the order of all categories
pub async fn reorder(ctx: &OrderingContext, ordered_ids: &[i64]) -> ServiceResult<ScopeChange> {
    bulk_reorder(ctx, &CATEGORIES, SCOPE, ordered_ids).await
}
