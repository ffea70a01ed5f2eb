//! Games: flat CRUD, listed newest first

use shared::error::{AppError, ErrorCode};
use shared::models::{Game, GameCreate, GameUpdate};
use sqlx::PgPool;

use crate::error::ServiceResult;

fn not_found(id: i64) -> AppError {
    AppError::new(ErrorCode::GameNotFound).with_detail("id", id)
}

pub async fn list(pool: &PgPool) -> ServiceResult<Vec<Game>> {
    let games = sqlx::query_as::<_, Game>(
        r#"
        SELECT id, title, category, image, created_at FROM games
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(games)
}

pub async fn get(pool: &PgPool, id: i64) -> ServiceResult<Game> {
    sqlx::query_as::<_, Game>(
        "SELECT id, title, category, image, created_at FROM games WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id).into())
}

pub async fn create(pool: &PgPool, data: GameCreate) -> ServiceResult<Game> {
    let game = sqlx::query_as::<_, Game>(
        r#"
        INSERT INTO games (id, title, category, image, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, category, image, created_at
        "#,
    )
    .bind(shared::util::snowflake_id())
    .bind(data.title.trim())
    .bind(data.category.trim())
    .bind(&data.image)
    .bind(shared::util::now_millis())
    .fetch_one(pool)
    .await?;
    tracing::info!(id = game.id, "Game created");
    Ok(game)
}

pub async fn update(pool: &PgPool, id: i64, data: GameUpdate) -> ServiceResult<Game> {
    sqlx::query_as::<_, Game>(
        r#"
        UPDATE games
        SET title = COALESCE($1, title), category = COALESCE($2, category),
            image = COALESCE($3, image)
        WHERE id = $4
        RETURNING id, title, category, image, created_at
        "#,
    )
    .bind(data.title.as_deref().map(str::trim))
    .bind(data.category.as_deref().map(str::trim))
    .bind(data.image.as_deref())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id).into())
}

/// Delete a game; its category and service links go with it
pub async fn delete(pool: &PgPool, id: i64) -> ServiceResult<()> {
    let result = sqlx::query("DELETE FROM games WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found(id).into());
    }
    tracing::info!(id, "Game deleted");
    Ok(())
}
