//! Services, ordered per parent category
//!
//! The scope of a service is `Category(category_id)`. Changing the category
//! moves the service between scopes in one transaction: the old category is
//! compacted and the service lands at the end of the new one, or at the
//! requested position there.

use std::collections::HashMap;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    PriceComponent, PriceComponentInput, PriceComponentKind, Service, ServiceCreate, ServiceUpdate,
};
use shared::ordering::ScopeKey;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::category::ensure_exists;
use super::{Outcome, Removed, bulk_reorder, load_game_links, replace_game_links};
use crate::db::ordering::engine::{self, MemberScope, ScopeChange};
use crate::db::ordering::{OrderStore, OrderingContext, PgOrderStore, SERVICES};
use crate::error::ServiceResult;

const SELECT: &str = r#"
    SELECT s.id, s.category_id, c.name AS category_name, s.title, s.price, s.image,
           s.description, s.display_order, s.created_at, s.updated_at
    FROM services s
    JOIN categories c ON c.id = s.category_id
"#;

fn not_found(id: i64) -> AppError {
    AppError::new(ErrorCode::ServiceNotFound).with_detail("id", id)
}

/// Load price components and game links for a batch of services
async fn attach_relations(conn: &mut PgConnection, services: &mut [Service]) -> ServiceResult<()> {
    let ids: Vec<i64> = services.iter().map(|s| s.id).collect();
    if ids.is_empty() {
        return Ok(());
    }

    let rows: Vec<(i64, i64, String, serde_json::Value, i32)> = sqlx::query_as(
        r#"
        SELECT id, service_id, kind, config, position FROM service_prices
        WHERE service_id = ANY($1)
        ORDER BY service_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;
    let mut prices: HashMap<i64, Vec<PriceComponent>> = HashMap::new();
    for (id, service_id, kind, config, position) in rows {
        let Some(kind) = PriceComponentKind::parse(&kind) else {
            tracing::warn!(
                id,
                service_id,
                kind = %kind,
                "Skipping price component of unknown type"
            );
            continue;
        };
        prices.entry(service_id).or_default().push(PriceComponent {
            id,
            service_id,
            kind,
            config,
            position,
        });
    }

    let mut games: HashMap<i64, Vec<i64>> = HashMap::new();
    for (service_id, game_id) in load_game_links(conn, "service_games", "service_id", &ids).await? {
        games.entry(service_id).or_default().push(game_id);
    }

    for service in services {
        service.price_components = prices.remove(&service.id).unwrap_or_default();
        service.game_ids = games.remove(&service.id).unwrap_or_default();
    }
    Ok(())
}

/// Services of one category, or of all categories in category order
pub async fn list(pool: &PgPool, category_id: Option<i64>) -> ServiceResult<Vec<Service>> {
    let mut conn = pool.acquire().await?;
    let mut services = match category_id {
        Some(category_id) => {
            sqlx::query_as::<_, Service>(&format!(
                "{SELECT} WHERE s.category_id = $1 ORDER BY s.display_order, s.id"
            ))
            .bind(category_id)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, Service>(&format!(
                "{SELECT} ORDER BY c.display_order, s.display_order, s.id"
            ))
            .fetch_all(&mut *conn)
            .await?
        }
    };
    attach_relations(&mut *conn, &mut services).await?;
    Ok(services)
}

async fn fetch(conn: &mut PgConnection, id: i64) -> ServiceResult<Service> {
    let service = sqlx::query_as::<_, Service>(&format!("{SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(id))?;
    let mut services = [service];
    attach_relations(conn, &mut services).await?;
    let [service] = services;
    Ok(service)
}

pub async fn get(pool: &PgPool, id: i64) -> ServiceResult<Service> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

/// Replace all price components of a service, keeping submission order
async fn replace_price_components(
    conn: &mut PgConnection,
    service_id: i64,
    components: &[PriceComponentInput],
) -> ServiceResult<()> {
    sqlx::query("DELETE FROM service_prices WHERE service_id = $1")
        .bind(service_id)
        .execute(&mut *conn)
        .await?;

    for (position, component) in components.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| AppError::validation("Too many price components"))?;
        sqlx::query(
            r#"
            INSERT INTO service_prices (id, service_id, kind, config, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(shared::util::snowflake_id())
        .bind(service_id)
        .bind(component.kind.as_str())
        .bind(&component.config)
        .bind(position)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

const LOCK_ATTEMPTS: usize = 3;

/// Open a transaction holding the scope lock of the service's category
///
/// `target` is locked along with it. Returns the category the service
/// belongs to once the lock is held; a service moved by another transaction
/// in the meantime is looked up again.
async fn begin_locked(
    ctx: &OrderingContext,
    id: i64,
    target: Option<i64>,
) -> ServiceResult<(Transaction<'static, Postgres>, i64)> {
    for attempt in 1..=LOCK_ATTEMPTS {
        let mut tx = ctx.pool.begin().await?;
        let locked = engine::lock_member_scope(
            &mut PgOrderStore::new(&mut *tx),
            &SERVICES,
            id,
            target.map(ScopeKey::Category),
        )
        .await
        .map_err(|e| SERVICES.error(e))?;
        match locked {
            MemberScope::Locked(ScopeKey::Category(category_id)) => return Ok((tx, category_id)),
            MemberScope::Locked(scope) => {
                return Err(AppError::internal(format!("service {id} in scope {scope}")).into());
            }
            MemberScope::Missing => return Err(not_found(id).into()),
            MemberScope::Moved => {
                tx.rollback().await?;
                tracing::debug!(id, attempt, "Service changed category while locking, retrying");
            }
        }
    }
    Err(AppError::with_message(
        ErrorCode::OrderStoreFailure,
        "Service keeps changing category, reload and retry",
    )
    .with_detail("id", id)
    .with_detail("reload", true)
    .into())
}

/// Create a service at the end of its category, or at `display_order`
pub async fn create(ctx: &OrderingContext, data: ServiceCreate) -> ServiceResult<Outcome<Service>> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    let scope = ScopeKey::Category(data.category_id);

    let mut tx = ctx.pool.begin().await?;
    let mut store = PgOrderStore::new(&mut *tx);

    // Scope lock first, as category deletion takes it before its row lock.
    store.lock_scope(&SERVICES, scope).await?;
    ensure_exists(store.conn(), data.category_id).await?;

    let placement = engine::place_new_member(&mut store, &SERVICES, scope, data.display_order)
        .await
        .map_err(|e| SERVICES.error(e))?;

    sqlx::query(
        r#"
        INSERT INTO services
            (id, category_id, title, price, image, description, display_order,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        "#,
    )
    .bind(id)
    .bind(data.category_id)
    .bind(data.title.trim())
    .bind(data.price)
    .bind(&data.image)
    .bind(&data.description)
    .bind(placement.order)
    .bind(now)
    .execute(store.conn())
    .await?;
    replace_price_components(store.conn(), id, &data.price_components).await?;
    replace_game_links(
        store.conn(),
        "service_games",
        "service_id",
        id,
        &data.game_ids,
    )
    .await?;

    engine::ensure_dense(&mut store, &SERVICES, scope)
        .await
        .map_err(|e| SERVICES.error(e))?;
    let service = fetch(store.conn(), id).await?;
    tx.commit().await?;
    ctx.succeeded(&SERVICES, scope);

    tracing::info!(id, scope = %scope, order = service.display_order, "Service created");
    Ok(Outcome::new(service, vec![placement.change]))
}

/// Update fields, optionally moving the service within or across categories
pub async fn update(
    ctx: &OrderingContext,
    id: i64,
    data: ServiceUpdate,
) -> ServiceResult<Outcome<Service>> {
    let now = shared::util::now_millis();

    let (mut tx, from) = begin_locked(ctx, id, data.category_id).await?;
    let target = data.category_id.filter(|to| *to != from);
    let mut store = PgOrderStore::new(&mut *tx);
    if let Some(to) = target {
        ensure_exists(store.conn(), to).await?;
    }

    let mut changes = Vec::new();
    let mut touched = vec![ScopeKey::Category(from)];
    match (target, data.display_order) {
        (Some(to), order) => {
            let transfer = engine::transfer_member(
                &mut store,
                &SERVICES,
                ScopeKey::Category(from),
                ScopeKey::Category(to),
                id,
                order,
            )
            .await
            .map_err(|e| SERVICES.error(e))?;
            changes.push(transfer.source);
            changes.push(transfer.target);
            touched.push(ScopeKey::Category(to));
        }
        (None, Some(order)) => {
            let scope = ScopeKey::Category(from);
            changes.push(
                engine::reposition_member(&mut store, &SERVICES, scope, id, order)
                    .await
                    .map_err(|e| SERVICES.error(e))?,
            );
        }
        (None, None) => {}
    }

    let result = sqlx::query(
        r#"
        UPDATE services
        SET title = COALESCE($1, title), price = COALESCE($2, price), image = COALESCE($3, image),
            description = COALESCE($4, description), updated_at = $5
        WHERE id = $6
        "#,
    )
    .bind(data.title.as_deref().map(str::trim))
    .bind(data.price)
    .bind(data.image.as_deref())
    .bind(data.description.as_deref())
    .bind(now)
    .bind(id)
    .execute(store.conn())
    .await?;
    if result.rows_affected() == 0 {
        return Err(not_found(id).into());
    }

    if let Some(ref components) = data.price_components {
        replace_price_components(store.conn(), id, components).await?;
    }
    if let Some(ref game_ids) = data.game_ids {
        replace_game_links(store.conn(), "service_games", "service_id", id, game_ids).await?;
    }

    let service = fetch(store.conn(), id).await?;
    tx.commit().await?;
    for scope in touched {
        ctx.succeeded(&SERVICES, scope);
    }

    if let Some(to) = target {
        tracing::info!(
            id,
            from,
            to,
            order = service.display_order,
            "Service moved to another category"
        );
    }
    Ok(Outcome::new(service, changes))
}

/// Delete a service and close the gap in its category
pub async fn delete(ctx: &OrderingContext, id: i64) -> ServiceResult<Removed> {
    let (mut tx, category_id) = begin_locked(ctx, id, None).await?;
    let scope = ScopeKey::Category(category_id);
    let change = engine::remove_member(&mut PgOrderStore::new(&mut *tx), &SERVICES, scope, id)
        .await
        .map_err(|e| SERVICES.error(e))?;
    tx.commit().await?;
    ctx.succeeded(&SERVICES, scope);

    tracing::info!(id, scope = %scope, "Service deleted");
    Ok(Removed { id, change })
}

/// Replace the order of one category's services
pub async fn reorder(
    ctx: &OrderingContext,
    category_id: i64,
    ordered_ids: &[i64],
) -> ServiceResult<ScopeChange> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&ctx.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::new(ErrorCode::CategoryNotFound)
            .with_detail("id", category_id)
            .into());
    }
    bulk_reorder(ctx, &SERVICES, ScopeKey::Category(category_id), ordered_ids).await
}
