use sqlx::Arguments;
use sqlx::Row;
use sqlx::error::BoxDynError;

use crate::db::Value;

/// The parts of a backend the generic mapper cannot reach through
/// `sqlx::Database` alone.
pub trait Driver: sqlx::Database {
    /// Encodes one [`Value`] onto the argument list.
    fn bind_value<'q>(
        args: &mut Self::Arguments<'q>,
        value: Value,
    ) -> Result<(), BoxDynError>;

    /// Reads the first column of a `SELECT COUNT(*)` row.
    fn read_count(row: &Self::Row) -> Result<i64, sqlx::Error>;

    fn rows_affected(result: &Self::QueryResult) -> u64;
}

impl Driver for sqlx::Postgres {
    fn bind_value<'q>(
        args: &mut Self::Arguments<'q>,
        value: Value,
    ) -> Result<(), BoxDynError> {
        match value {
            Value::BigInt(v) => Arguments::add(args, v),
            Value::Text(v) => Arguments::add(args, v),
            Value::Timestamp(v) => Arguments::add(args, v),
            Value::Null => Arguments::add(args, None::<String>),
        }
    }

    fn read_count(row: &sqlx::postgres::PgRow) -> Result<i64, sqlx::Error> {
        row.try_get(0)
    }

    fn rows_affected(result: &sqlx::postgres::PgQueryResult) -> u64 {
        result.rows_affected()
    }
}

impl Driver for sqlx::Sqlite {
    fn bind_value<'q>(
        args: &mut Self::Arguments<'q>,
        value: Value,
    ) -> Result<(), BoxDynError> {
        match value {
            Value::BigInt(v) => Arguments::add(args, v),
            Value::Text(v) => Arguments::add(args, v),
            Value::Timestamp(v) => Arguments::add(args, v),
            Value::Null => Arguments::add(args, None::<String>),
        }
    }

    fn read_count(row: &sqlx::sqlite::SqliteRow) -> Result<i64, sqlx::Error> {
        row.try_get(0)
    }

    fn rows_affected(result: &sqlx::sqlite::SqliteQueryResult) -> u64 {
        result.rows_affected()
    }
}
