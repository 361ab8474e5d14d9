use futures_core::{future::BoxFuture, stream::BoxStream};

use sqlx::Acquire;

/// Where a mapper call runs: on the pool, inside a transaction, or on one
/// pooled connection. Callers own the handle and therefore the
/// transaction boundary.
#[derive(Debug)]
pub enum Handle<'c, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    Pool(sqlx::Pool<DB>),
    Transaction(sqlx::Transaction<'c, DB>),
    Connection(sqlx::pool::PoolConnection<DB>),
}

impl<'c, DB> Handle<'c, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    /// Opens a transaction on top of this handle. Beginning on a
    /// transaction handle creates a savepoint.
    pub async fn begin(&mut self) -> crate::Result<Handle<'_, DB>> {
        let tx = match self {
            Handle::Pool(pool) => pool.begin().await,
            Handle::Transaction(tx) => tx.begin().await,
            Handle::Connection(conn) => conn.begin().await,
        }
        .map_err(crate::db::map_err)?;
        tracing::trace!("transaction started");
        Ok(Handle::Transaction(tx))
    }

    /// Commits a transaction handle; a no-op for the other variants.
    pub async fn commit(self) -> crate::Result<()> {
        match self {
            Handle::Transaction(tx) => {
                tx.commit().await.map_err(crate::db::map_err)?;
                tracing::trace!("transaction committed");
                Ok(())
            }
            Handle::Pool(_) | Handle::Connection(_) => Ok(()),
        }
    }

    /// Rolls back a transaction handle; a no-op for the other variants.
    pub async fn rollback(self) -> crate::Result<()> {
        match self {
            Handle::Transaction(tx) => {
                tx.rollback().await.map_err(crate::db::map_err)?;
                tracing::trace!("transaction rolled back");
                Ok(())
            }
            Handle::Pool(_) | Handle::Connection(_) => Ok(()),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Handle::Transaction(_))
    }
}

impl<DB> From<sqlx::Pool<DB>> for Handle<'_, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    fn from(pool: sqlx::Pool<DB>) -> Self {
        Handle::Pool(pool)
    }
}

#[derive(Debug)]
pub struct ExecutorImpl<'h, 'c, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    pub handle: &'h mut Handle<'c, DB>,
}

pub trait AsExecutor {
    type Executor<'h>: sqlx::Executor<'h>
    where
        Self: 'h;

    fn as_executor<'h>(&'h mut self) -> Self::Executor<'h>;
}

impl<'c, DB> AsExecutor for Handle<'c, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    type Executor<'h>
        = ExecutorImpl<'h, 'c, DB>
    where
        'c: 'h;

    fn as_executor<'h>(&'h mut self) -> Self::Executor<'h> {
        ExecutorImpl { handle: self }
    }
}

impl<'h, 'c, DB> sqlx::Executor<'h> for ExecutorImpl<'h, 'c, DB>
where
    DB: sqlx::Database,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    type Database = DB;

    fn fetch_many<'e, 'q: 'e, E>(
        self,
        query: E,
    ) -> BoxStream<
        'e,
        Result<
            sqlx::Either<
                <Self::Database as sqlx::Database>::QueryResult,
                <Self::Database as sqlx::Database>::Row,
            >,
            sqlx::Error,
        >,
    >
    where
        'c: 'e,
        'h: 'e,
        E: 'q + sqlx::Execute<'q, Self::Database>,
    {
        match self.handle {
            Handle::Pool(pool) => pool.fetch_many(query),
            Handle::Transaction(tx) => tx.fetch_many(query),
            Handle::Connection(conn) => conn.fetch_many(query),
        }
    }

    fn fetch_optional<'e, 'q: 'e, E>(
        self,
        query: E,
    ) -> BoxFuture<
        'e,
        Result<Option<<Self::Database as sqlx::Database>::Row>, sqlx::Error>,
    >
    where
        'c: 'e,
        'h: 'e,
        E: 'q + sqlx::Execute<'q, Self::Database>,
    {
        match self.handle {
            Handle::Pool(pool) => pool.fetch_optional(query),
            Handle::Transaction(tx) => tx.fetch_optional(query),
            Handle::Connection(conn) => conn.fetch_optional(query),
        }
    }

    fn prepare_with<'e, 'q: 'e>(
        self,
        sql: &'q str,
        parameters: &'e [<Self::Database as sqlx::Database>::TypeInfo],
    ) -> BoxFuture<
        'e,
        Result<<Self::Database as sqlx::Database>::Statement<'q>, sqlx::Error>,
    >
    where
        'c: 'e,
        'h: 'e,
    {
        match self.handle {
            Handle::Pool(pool) => pool.prepare_with(sql, parameters),
            Handle::Transaction(tx) => tx.prepare_with(sql, parameters),
            Handle::Connection(conn) => conn.prepare_with(sql, parameters),
        }
    }

    fn describe<'e, 'q: 'e>(
        self,
        sql: &'q str,
    ) -> BoxFuture<'e, Result<sqlx::Describe<Self::Database>, sqlx::Error>>
    where
        'c: 'e,
        'h: 'e,
    {
        match self.handle {
            Handle::Pool(pool) => pool.describe(sql),
            Handle::Transaction(tx) => tx.describe(sql),
            Handle::Connection(conn) => conn.describe(sql),
        }
    }
}
