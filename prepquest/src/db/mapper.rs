use std::marker::PhantomData;

use crate::db::{
    AsExecutor, Condition, Driver, Entity, Handle, Page, PageRequest,
    Statement, Value, map_err,
};

/// Generic CRUD over one table. Every call borrows a [`Handle`], so the
/// caller decides whether it runs on the pool or inside a transaction.
#[async_trait::async_trait]
pub trait BaseMapper<T, DB>: Send + Sync
where
    T: Entity,
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
    /// Inserts every non-key column and returns the stored row, including
    /// its generated key. `entity.id()` is ignored.
    async fn insert(
        &self,
        h: &mut Handle<'_, DB>,
        entity: T,
    ) -> crate::Result<T>;

    async fn find_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        id: i64,
    ) -> crate::Result<Option<T>>;

    async fn find_by_ids(
        &self,
        h: &mut Handle<'_, DB>,
        ids: &[i64],
    ) -> crate::Result<Vec<T>>;

    async fn find_all(&self, h: &mut Handle<'_, DB>) -> crate::Result<Vec<T>>;

    async fn find_by_condition(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<Vec<T>>;

    /// Fails with [`crate::Error::TooManyResults`] when more than one row
    /// matches.
    async fn find_one(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<Option<T>>;

    async fn count(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<u64>;

    async fn find_page(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
        page: PageRequest,
    ) -> crate::Result<Page<T>>;

    /// Overwrites every non-key column of the row keyed by `entity.id()`.
    /// Returns the number of affected rows.
    async fn update_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        entity: &T,
    ) -> crate::Result<u64>;

    async fn delete_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        id: i64,
    ) -> crate::Result<u64>;

    async fn delete_by_ids(
        &self,
        h: &mut Handle<'_, DB>,
        ids: &[i64],
    ) -> crate::Result<u64>;

    /// Refuses an empty condition.
    async fn delete_by_condition(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<u64>;
}

/// The single [`BaseMapper`] implementation, driven entirely by
/// [`Entity`] metadata.
pub struct TableMapper<T> {
    _entity: PhantomData<fn() -> T>,
}

impl<T> TableMapper<T> {
    pub const fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<T> Default for TableMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TableMapper<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableMapper<T> {}

impl<T: Entity> std::fmt::Debug for TableMapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMapper").field("table", &T::TABLE).finish()
    }
}

fn select<'a, T: Entity, DB: Driver>() -> Statement<'a, DB> {
    Statement::new(format!("SELECT * FROM {}", T::TABLE))
}

fn select_by_condition<'a, T: Entity, DB: Driver>(
    condition: &Condition,
) -> crate::Result<Statement<'a, DB>> {
    condition.validate::<T>()?;
    let mut builder = select::<T, DB>();
    condition.push_where(&mut builder);
    condition.push_order_by(&mut builder, None);
    Ok(builder)
}

fn key_eq<T: Entity, DB: Driver>(builder: &mut Statement<'_, DB>, id: i64) {
    builder.push(" WHERE ").push(T::ID_COLUMN).push(" = ");
    builder.push_bind(Value::BigInt(id));
}

fn key_in<T: Entity, DB: Driver>(
    builder: &mut Statement<'_, DB>,
    ids: &[i64],
) {
    builder.push(" WHERE ").push(T::ID_COLUMN).push(" IN (");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push_bind(Value::BigInt(*id));
    }
    builder.push(")");
}

fn checked_values<T: Entity>(entity: &T) -> crate::Result<Vec<Value>> {
    let values = entity.values();
    if values.len() != T::COLUMNS.len() {
        return Err(crate::Error::InvalidQuery(format!(
            "`{}` entity yielded {} values for {} columns",
            T::TABLE,
            values.len(),
            T::COLUMNS.len()
        )));
    }
    Ok(values)
}

fn push_limit<DB: Driver>(
    builder: &mut Statement<'_, DB>,
    page: PageRequest,
) {
    let limit = i64::try_from(page.size).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    builder.push(" LIMIT ").push_bind(Value::BigInt(limit));
    builder.push(" OFFSET ").push_bind(Value::BigInt(offset));
}

pub(crate) fn insert_sql<'a, T: Entity, DB: Driver>(
    entity: &T,
) -> crate::Result<Statement<'a, DB>> {
    let values = checked_values(entity)?;
    let mut builder = Statement::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        T::TABLE,
        T::COLUMNS.join(", ")
    ));
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push_bind(value);
    }
    builder.push(") RETURNING *");
    Ok(builder)
}

pub(crate) fn update_sql<'a, T: Entity, DB: Driver>(
    entity: &T,
) -> crate::Result<Statement<'a, DB>> {
    let values = checked_values(entity)?;
    let mut builder = Statement::new(format!("UPDATE {} SET ", T::TABLE));
    for (i, (column, value)) in T::COLUMNS.iter().zip(values).enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(column).push(" = ").push_bind(value);
    }
    key_eq::<T, DB>(&mut builder, entity.id());
    Ok(builder)
}

fn delete_from<'a, T: Entity, DB: Driver>() -> Statement<'a, DB> {
    Statement::new(format!("DELETE FROM {}", T::TABLE))
}

// `sql` and `args` share one lifetime; split the statement in the caller.
async fn execute<'q, DB>(
    h: &mut Handle<'_, DB>,
    sql: &'q str,
    args: DB::Arguments<'q>,
) -> crate::Result<u64>
where
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
    for<'a> DB::Arguments<'a>: sqlx::IntoArguments<'a, DB>,
{
    let result = sqlx::query_with::<DB, _>(sql, args)
        .execute(h.as_executor())
        .await
        .map_err(map_err)?;
    Ok(DB::rows_affected(&result))
}

#[async_trait::async_trait]
impl<T, DB> BaseMapper<T, DB> for TableMapper<T>
where
    T: Entity + for<'r> sqlx::FromRow<'r, DB::Row>,
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
{
    async fn insert(
        &self,
        h: &mut Handle<'_, DB>,
        entity: T,
    ) -> crate::Result<T> {
        let builder = insert_sql::<T, DB>(&entity)?;
        tracing::debug!(table = T::TABLE, sql = builder.sql(), "insert");
        let (sql, args) = builder.into_parts()?;
        sqlx::query_as_with::<DB, T, _>(&sql, args)
            .fetch_one(h.as_executor())
            .await
            .map_err(map_err)
    }

    async fn find_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        id: i64,
    ) -> crate::Result<Option<T>> {
        let mut builder = select::<T, DB>();
        key_eq::<T, DB>(&mut builder, id);
        tracing::debug!(table = T::TABLE, id, "find by id");
        let (sql, args) = builder.into_parts()?;
        sqlx::query_as_with::<DB, T, _>(&sql, args)
            .fetch_optional(h.as_executor())
            .await
            .map_err(map_err)
    }

    async fn find_by_ids(
        &self,
        h: &mut Handle<'_, DB>,
        ids: &[i64],
    ) -> crate::Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = select::<T, DB>();
        key_in::<T, DB>(&mut builder, ids);
        tracing::debug!(table = T::TABLE, ids = ids.len(), "find by ids");
        let (sql, args) = builder.into_parts()?;
        sqlx::query_as_with::<DB, T, _>(&sql, args)
            .fetch_all(h.as_executor())
            .await
            .map_err(map_err)
    }

    async fn find_all(&self, h: &mut Handle<'_, DB>) -> crate::Result<Vec<T>> {
        BaseMapper::<T, DB>::find_by_condition(self, h, &Condition::new())
            .await
    }

    async fn find_by_condition(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<Vec<T>> {
        let builder = select_by_condition::<T, DB>(condition)?;
        tracing::debug!(table = T::TABLE, sql = builder.sql(), "select");
        let (sql, args) = builder.into_parts()?;
        sqlx::query_as_with::<DB, T, _>(&sql, args)
            .fetch_all(h.as_executor())
            .await
            .map_err(map_err)
    }

    async fn find_one(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<Option<T>> {
        let mut builder = select_by_condition::<T, DB>(condition)?;
        // two rows are enough to detect ambiguity
        builder.push(" LIMIT 2");
        tracing::debug!(table = T::TABLE, sql = builder.sql(), "select one");
        let (sql, args) = builder.into_parts()?;
        let mut rows = sqlx::query_as_with::<DB, T, _>(&sql, args)
            .fetch_all(h.as_executor())
            .await
            .map_err(map_err)?;
        if rows.len() > 1 {
            return Err(crate::Error::TooManyResults(format!(
                "expected at most one `{}` row",
                T::TABLE
            )));
        }
        Ok(rows.pop())
    }

    async fn count(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<u64> {
        condition.validate::<T>()?;
        let mut builder = Statement::<DB>::new(format!(
            "SELECT COUNT(*) FROM {}",
            T::TABLE
        ));
        condition.push_where(&mut builder);
        tracing::debug!(table = T::TABLE, sql = builder.sql(), "count");
        let (sql, args) = builder.into_parts()?;
        let row = sqlx::query_with::<DB, _>(&sql, args)
            .fetch_one(h.as_executor())
            .await
            .map_err(map_err)?;
        let count = DB::read_count(&row).map_err(map_err)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_page(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
        page: PageRequest,
    ) -> crate::Result<Page<T>> {
        page.validate()?;
        let total = BaseMapper::<T, DB>::count(self, h, condition).await?;

        let records = if total <= page.offset() {
            Vec::new()
        } else {
            let mut builder = select::<T, DB>();
            condition.push_where(&mut builder);
            // stable pages need a total order
            condition.push_order_by(&mut builder, Some(T::ID_COLUMN));
            push_limit(&mut builder, page);
            tracing::debug!(table = T::TABLE, sql = builder.sql(), "page");
            let (sql, args) = builder.into_parts()?;
            sqlx::query_as_with::<DB, T, _>(&sql, args)
                .fetch_all(h.as_executor())
                .await
                .map_err(map_err)?
        };

        Ok(Page {
            records,
            total,
            current: page.current,
            size: page.size,
        })
    }

    async fn update_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        entity: &T,
    ) -> crate::Result<u64> {
        let builder = update_sql::<T, DB>(entity)?;
        tracing::debug!(table = T::TABLE, id = entity.id(), "update by id");
        let (sql, args) = builder.into_parts()?;
        execute(h, &sql, args).await
    }

    async fn delete_by_id(
        &self,
        h: &mut Handle<'_, DB>,
        id: i64,
    ) -> crate::Result<u64> {
        let mut builder = delete_from::<T, DB>();
        key_eq::<T, DB>(&mut builder, id);
        tracing::debug!(table = T::TABLE, id, "delete by id");
        let (sql, args) = builder.into_parts()?;
        execute(h, &sql, args).await
    }

    async fn delete_by_ids(
        &self,
        h: &mut Handle<'_, DB>,
        ids: &[i64],
    ) -> crate::Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder = delete_from::<T, DB>();
        key_in::<T, DB>(&mut builder, ids);
        tracing::debug!(table = T::TABLE, ids = ids.len(), "delete by ids");
        let (sql, args) = builder.into_parts()?;
        execute(h, &sql, args).await
    }

    async fn delete_by_condition(
        &self,
        h: &mut Handle<'_, DB>,
        condition: &Condition,
    ) -> crate::Result<u64> {
        if condition.is_empty() {
            return Err(crate::Error::InvalidQuery(format!(
                "refusing to delete from `{}` without a condition",
                T::TABLE
            )));
        }
        condition.validate::<T>()?;
        let mut builder = delete_from::<T, DB>();
        condition.push_where(&mut builder);
        tracing::debug!(table = T::TABLE, sql = builder.sql(), "delete");
        let (sql, args) = builder.into_parts()?;
        execute(h, &sql, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, Sqlite, SqlitePool};

    #[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
    struct Note {
        id: i64,
        body: String,
        author: Option<String>,
    }

    impl Entity for Note {
        const TABLE: &'static str = "note";
        const COLUMNS: &'static [&'static str] = &["body", "author"];

        fn id(&self) -> i64 {
            self.id
        }

        fn values(&self) -> Vec<Value> {
            vec![self.body.clone().into(), self.author.clone().into()]
        }
    }

    fn note(body: &str, author: Option<&str>) -> Note {
        Note {
            id: 0,
            body: body.into(),
            author: author.map(Into::into),
        }
    }

    async fn setup_db() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open sqlite");
        sqlx::query(
            "CREATE TABLE note (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL,
                author TEXT
            )",
        )
        .execute(&pool)
        .await
        .expect("Failed to create table");
        pool
    }

    #[test]
    fn test_insert_sql() {
        let builder = insert_sql::<Note, Postgres>(&note("a", None)).unwrap();
        assert_eq!(
            builder.sql(),
            "INSERT INTO note (body, author) VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn test_update_sql() {
        let mut n = note("a", Some("kai"));
        n.id = 4;
        let builder = update_sql::<Note, Sqlite>(&n).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE note SET body = ?, author = ? WHERE id = ?"
        );
    }

    #[test]
    fn test_value_arity_is_checked() {
        struct Broken;
        impl Entity for Broken {
            const TABLE: &'static str = "broken";
            const COLUMNS: &'static [&'static str] = &["a", "b"];
            fn id(&self) -> i64 {
                0
            }
            fn values(&self) -> Vec<Value> {
                vec![Value::Null]
            }
        }
        assert!(matches!(
            insert_sql::<Broken, Postgres>(&Broken),
            Err(crate::Error::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_table_mapper_crud() -> crate::Result<()> {
        let mut h = Handle::Pool(setup_db().await);
        let mapper = TableMapper::<Note>::new();

        let created = mapper.insert(&mut h, note("first", None)).await?;
        assert!(created.id > 0);
        assert_eq!(created.body, "first");

        let found = mapper.find_by_id(&mut h, created.id).await?;
        assert_eq!(found, Some(created.clone()));

        let mut changed = created.clone();
        changed.author = Some("kai".into());
        assert_eq!(mapper.update_by_id(&mut h, &changed).await?, 1);
        assert_eq!(mapper.find_by_id(&mut h, created.id).await?, Some(changed));

        assert_eq!(mapper.delete_by_id(&mut h, created.id).await?, 1);
        assert_eq!(mapper.find_by_id(&mut h, created.id).await?, None);
        assert_eq!(mapper.delete_by_id(&mut h, created.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_table_mapper_queries() -> crate::Result<()> {
        let mut h = Handle::Pool(setup_db().await);
        let mapper = TableMapper::<Note>::new();

        let mut ids = Vec::new();
        for (body, author) in [
            ("alpha", Some("kai")),
            ("beta", Some("kai")),
            ("gamma", None),
            ("delta", Some("zk")),
        ] {
            ids.push(mapper.insert(&mut h, note(body, author)).await?.id);
        }

        let by_kai = Condition::new().eq("author", "kai").order_desc("id");
        let rows = mapper.find_by_condition(&mut h, &by_kai).await?;
        let bodies: Vec<_> = rows.iter().map(|n| n.body.as_str()).collect();
        assert_eq!(bodies, ["beta", "alpha"]);
        assert_eq!(mapper.count(&mut h, &by_kai).await?, 2);

        let no_author = Condition::new().is_null("author");
        let one = mapper.find_one(&mut h, &no_author).await?;
        assert_eq!(one.map(|n| n.body), Some("gamma".to_string()));
        assert!(matches!(
            mapper.find_one(&mut h, &by_kai).await,
            Err(crate::Error::TooManyResults(_))
        ));

        let found = mapper.find_by_ids(&mut h, &[ids[0], ids[3]]).await?;
        assert_eq!(found.len(), 2);
        assert!(mapper.find_by_ids(&mut h, &[]).await?.is_empty());

        let page = mapper
            .find_page(&mut h, &Condition::new(), PageRequest::new(2, 3))
            .await?;
        assert_eq!(page.total, 4);
        assert_eq!(page.pages(), 2);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].body, "delta");

        let past_end = mapper
            .find_page(&mut h, &Condition::new(), PageRequest::new(3, 3))
            .await?;
        assert!(past_end.records.is_empty());
        assert_eq!(past_end.total, 4);
        assert!(!past_end.has_next());

        assert!(matches!(
            mapper
                .find_page(&mut h, &Condition::new(), PageRequest::new(0, 3))
                .await,
            Err(crate::Error::InvalidQuery(_))
        ));

        let nobody = Condition::new().eq("author", "nobody");
        assert_eq!(mapper.find_one(&mut h, &nobody).await?, None);

        let bad = Condition::new().eq("missing", 1);
        assert!(matches!(
            mapper.find_by_condition(&mut h, &bad).await,
            Err(crate::Error::InvalidQuery(_))
        ));
        assert!(matches!(
            mapper.delete_by_condition(&mut h, &Condition::new()).await,
            Err(crate::Error::InvalidQuery(_))
        ));

        assert_eq!(mapper.delete_by_condition(&mut h, &by_kai).await?, 2);
        assert_eq!(mapper.delete_by_ids(&mut h, &[]).await?, 0);
        assert_eq!(mapper.delete_by_ids(&mut h, &ids).await?, 2);
        assert!(mapper.find_all(&mut h).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_like_matches_wildcards_literally() -> crate::Result<()> {
        let mut h = Handle::Pool(setup_db().await);
        let mapper = TableMapper::<Note>::new();
        for body in ["100% rust", "100 ways", "snake_case", "snakeXcase"] {
            mapper.insert(&mut h, note(body, None)).await?;
        }

        let percent = Condition::new().like("body", "100%");
        let rows = mapper.find_by_condition(&mut h, &percent).await?;
        let bodies: Vec<_> = rows.iter().map(|n| n.body.as_str()).collect();
        assert_eq!(bodies, ["100% rust"]);

        let underscore = Condition::new().like("body", "e_c");
        let rows = mapper.find_by_condition(&mut h, &underscore).await?;
        let bodies: Vec<_> = rows.iter().map(|n| n.body.as_str()).collect();
        assert_eq!(bodies, ["snake_case"]);

        // plain needles still match anywhere in the value
        let ways = Condition::new().like("body", "way");
        assert_eq!(mapper.count(&mut h, &ways).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_condition_on_null_values() -> crate::Result<()> {
        let mut h = Handle::Pool(setup_db().await);
        let mapper = TableMapper::<Note>::new();
        mapper.insert(&mut h, note("signed", Some("kai"))).await?;
        mapper.insert(&mut h, note("anonymous", None)).await?;

        let unsigned = Condition::new().eq("author", None::<String>);
        let rows = mapper.find_by_condition(&mut h, &unsigned).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "anonymous");

        let signed = Condition::new().ne("author", None::<String>);
        assert_eq!(mapper.count(&mut h, &signed).await?, 1);

        let never = Condition::new().lt("author", None::<String>);
        assert!(matches!(
            mapper.count(&mut h, &never).await,
            Err(crate::Error::InvalidQuery(_))
        ));
        Ok(())
    }
}
