//! Scoped store adapter
//!
//! Every statement carries the scope discriminator, so an operation on one
//! category's services can never touch another category's rows.

use async_trait::async_trait;
use shared::ordering::{OrderSlot, ScopeKey};
use sqlx::PgConnection;

use super::OrderedTable;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Row-level access to ordered tables inside one transaction
#[async_trait]
pub trait OrderStore: Send {
    /// Serialize writers of `scope` until the transaction ends
    async fn lock_scope(&mut self, table: &OrderedTable, scope: ScopeKey) -> Result<(), BoxError>;

    /// `(id, display_order)` rows of the scope, ordered by `display_order, id`
    async fn load_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError>;

    /// Same rows as [`OrderStore::load_scope`] without locking them
    async fn read_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError>;

    /// Scope the row currently belongs to; `None` when it does not exist
    async fn member_scope(
        &mut self,
        table: &OrderedTable,
        id: i64,
    ) -> Result<Option<ScopeKey>, BoxError>;

    /// Set one row's order; `false` when the row is not in `scope`
    async fn write_order(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError>;

    /// Set many rows' orders, returning how many rows matched
    async fn write_orders(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        slots: &[OrderSlot],
    ) -> Result<usize, BoxError> {
        let mut matched = 0;
        for slot in slots {
            if self
                .write_order(table, scope, slot.id, slot.display_order)
                .await?
            {
                matched += 1;
            }
        }
        Ok(matched)
    }

    /// Postpone the `(scope, display_order)` uniqueness check to commit.
    /// Returns `false` when the store cannot.
    async fn defer_uniqueness(&mut self, table: &OrderedTable) -> Result<bool, BoxError>;

    /// Delete a row, returning the order it held
    async fn remove_member(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
    ) -> Result<Option<i32>, BoxError>;

    /// Move a row from one scope to another at `order`
    async fn relocate_member(
        &mut self,
        table: &OrderedTable,
        from: ScopeKey,
        to: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError>;
}

/// Column filter for a scope, with the scope id to bind as `$param`
fn scope_filter(
    table: &OrderedTable,
    scope: ScopeKey,
    param: usize,
) -> Result<(String, Option<i64>), BoxError> {
    match (table.scope_column, scope) {
        (None, ScopeKey::Global) => Ok((String::new(), None)),
        (Some(column), ScopeKey::Category(id)) => {
            Ok((format!(" AND {column} = ${param}"), Some(id)))
        }
        _ => Err(format!("scope {scope} does not apply to table {}", table.name).into()),
    }
}

/// [`OrderStore`] over a PostgreSQL transaction
pub struct PgOrderStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgOrderStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// The underlying transaction, for entity statements between ordering steps
    pub fn conn(&mut self) -> &mut PgConnection {
        self.conn
    }

    async fn select_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        locking: &str,
    ) -> Result<Vec<OrderSlot>, BoxError> {
        let (filter, scope_id) = scope_filter(table, scope, 1)?;
        let sql = format!(
            "SELECT id, display_order FROM {} WHERE TRUE{filter} \
             ORDER BY display_order, id{locking}",
            table.name
        );
        let mut query = sqlx::query_as::<_, OrderSlot>(&sql);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }
        Ok(query.fetch_all(&mut *self.conn).await?)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore<'_> {
    async fn lock_scope(&mut self, table: &OrderedTable, scope: ScopeKey) -> Result<(), BoxError> {
        scope_filter(table, scope, 1)?;
        let key = format!("{}:{}", table.name, scope);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn load_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError> {
        self.select_scope(table, scope, " FOR UPDATE").await
    }

    async fn read_scope(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
    ) -> Result<Vec<OrderSlot>, BoxError> {
        self.select_scope(table, scope, "").await
    }

    async fn member_scope(
        &mut self,
        table: &OrderedTable,
        id: i64,
    ) -> Result<Option<ScopeKey>, BoxError> {
        let sql = match table.scope_column {
            Some(column) => format!("SELECT {column} FROM {} WHERE id = $1", table.name),
            None => format!("SELECT id FROM {} WHERE id = $1", table.name),
        };
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row.map(|(value,)| match table.scope_column {
            Some(_) => ScopeKey::Category(value),
            None => ScopeKey::Global,
        }))
    }

    async fn write_order(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError> {
        let (filter, scope_id) = scope_filter(table, scope, 3)?;
        let sql = format!(
            "UPDATE {} SET display_order = $1 WHERE id = $2{filter}",
            table.name
        );
        let mut query = sqlx::query(&sql).bind(order).bind(id);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }
        let result = query.execute(&mut *self.conn).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn write_orders(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        slots: &[OrderSlot],
    ) -> Result<usize, BoxError> {
        if slots.is_empty() {
            return Ok(0);
        }
        let (filter, scope_id) = scope_filter(table, scope, 3)?;
        let filter = filter.replace(" AND ", " AND t.");
        let ids: Vec<i64> = slots.iter().map(|s| s.id).collect();
        let orders: Vec<i32> = slots.iter().map(|s| s.display_order).collect();
        let sql = format!(
            r#"UPDATE {} AS t SET display_order = u.display_order
            FROM (SELECT * FROM UNNEST($1::bigint[], $2::integer[])) AS u(id, display_order)
            WHERE t.id = u.id{filter}"#,
            table.name
        );
        let mut query = sqlx::query(&sql).bind(&ids).bind(&orders);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }
        let result = query.execute(&mut *self.conn).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn defer_uniqueness(&mut self, table: &OrderedTable) -> Result<bool, BoxError> {
        let deferrable: Option<(bool,)> =
            sqlx::query_as("SELECT condeferrable FROM pg_constraint WHERE conname = $1")
                .bind(table.order_constraint)
                .fetch_optional(&mut *self.conn)
                .await?;
        if !matches!(deferrable, Some((true,))) {
            return Ok(false);
        }
        let sql = format!("SET CONSTRAINTS {} DEFERRED", table.order_constraint);
        sqlx::query(&sql).execute(&mut *self.conn).await?;
        Ok(true)
    }

    async fn remove_member(
        &mut self,
        table: &OrderedTable,
        scope: ScopeKey,
        id: i64,
    ) -> Result<Option<i32>, BoxError> {
        let (filter, scope_id) = scope_filter(table, scope, 2)?;
        let sql = format!(
            "DELETE FROM {} WHERE id = $1{filter} RETURNING display_order",
            table.name
        );
        let mut query = sqlx::query_as::<_, (i32,)>(&sql).bind(id);
        if let Some(scope_id) = scope_id {
            query = query.bind(scope_id);
        }
        let row = query.fetch_optional(&mut *self.conn).await?;
        Ok(row.map(|(order,)| order))
    }

    async fn relocate_member(
        &mut self,
        table: &OrderedTable,
        from: ScopeKey,
        to: ScopeKey,
        id: i64,
        order: i32,
    ) -> Result<bool, BoxError> {
        let (Some(column), ScopeKey::Category(from_id), ScopeKey::Category(to_id)) =
            (table.scope_column, from, to)
        else {
            return Err(format!("table {} has no movable scope", table.name).into());
        };
        let sql = format!(
            "UPDATE {} SET {column} = $1, display_order = $2 WHERE id = $3 AND {column} = $4",
            table.name
        );
        let result = sqlx::query(&sql)
            .bind(to_id)
            .bind(order)
            .bind(id)
            .bind(from_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ordering::{FAQ_ITEMS, SERVICES};

    #[test]
    fn filter_for_global_table_is_empty() {
        let (filter, id) = scope_filter(&FAQ_ITEMS, ScopeKey::Global, 3).unwrap();
        assert!(filter.is_empty());
        assert_eq!(id, None);
    }

    #[test]
    fn filter_for_services_binds_category() {
        let (filter, id) = scope_filter(&SERVICES, ScopeKey::Category(9), 3).unwrap();
        assert_eq!(filter, " AND category_id = $3");
        assert_eq!(id, Some(9));
    }

    #[test]
    fn mismatched_scope_is_rejected() {
        assert!(scope_filter(&SERVICES, ScopeKey::Global, 1).is_err());
        assert!(scope_filter(&FAQ_ITEMS, ScopeKey::Category(1), 1).is_err());
    }
}
