use std::fmt::Display;

use sqlx::Arguments;

use crate::db::{Driver, Value};

/// SQL text plus its bind arguments, assembled piece by piece.
///
/// Unlike [`sqlx::QueryBuilder`] the arguments are handed out by value
/// through [`Statement::into_parts`], so the caller can borrow the SQL and
/// move the arguments into `sqlx::query_with` / `sqlx::query_as_with`
/// without tying the borrow to the builder itself.
pub struct Statement<'args, DB: Driver> {
    sql: String,
    arguments: DB::Arguments<'args>,
    error: Option<sqlx::Error>,
}

impl<'args, DB: Driver> Statement<'args, DB> {
    pub fn new(init: impl Into<String>) -> Self {
        Self {
            sql: init.into(),
            arguments: Default::default(),
            error: None,
        }
    }

    pub fn push(&mut self, sql: impl Display) -> &mut Self {
        use std::fmt::Write;
        // writing into a String cannot fail
        let _ = write!(self.sql, "{sql}");
        self
    }

    /// Binds `value` and appends the backend's placeholder for it.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        if let Err(e) = DB::bind_value(&mut self.arguments, value) {
            self.error.get_or_insert(sqlx::Error::Encode(e));
        }
        let _ = self.arguments.format_placeholder(&mut self.sql);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of bound values so far.
    pub fn bind_count(&self) -> usize {
        self.arguments.len()
    }

    /// Fails with the first encode error hit while binding.
    pub fn into_parts(self) -> crate::Result<(String, DB::Arguments<'args>)> {
        match self.error {
            Some(e) => Err(crate::db::map_err(e)),
            None => Ok((self.sql, self.arguments)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, Sqlite};

    #[test]
    fn test_placeholders_follow_backend() {
        let mut pg = Statement::<Postgres>::new("SELECT * FROM t WHERE a = ");
        pg.push_bind(Value::BigInt(1))
            .push(" AND b = ")
            .push_bind(Value::Text("x".into()));
        assert_eq!(pg.sql(), "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(pg.bind_count(), 2);

        let mut lite = Statement::<Sqlite>::new("SELECT * FROM t WHERE a = ");
        lite.push_bind(Value::Null);
        assert_eq!(lite.sql(), "SELECT * FROM t WHERE a = ?");
        assert_eq!(lite.bind_count(), 1);
    }

    #[test]
    fn test_into_parts_keeps_sql() {
        let mut stmt = Statement::<Sqlite>::new("DELETE FROM t WHERE id = ");
        stmt.push_bind(Value::BigInt(9));
        let (sql, args) = stmt.into_parts().unwrap();
        assert_eq!(sql, "DELETE FROM t WHERE id = ?");
        assert_eq!(args.len(), 1);
    }
}
