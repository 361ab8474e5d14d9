use chrono::{DateTime, Utc};

/// Table metadata for a row type handled by [`TableMapper`].
///
/// `values()` must yield exactly one [`Value`] per entry of `COLUMNS`, in
/// the same order. The key column is never part of `COLUMNS`: it is
/// generated on insert and addressed separately on update.
///
/// [`TableMapper`]: crate::db::TableMapper
pub trait Entity: Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;

    fn values(&self) -> Vec<Value>;

    fn has_column(name: &str) -> bool {
        name == Self::ID_COLUMN || Self::COLUMNS.contains(&name)
    }
}

/// A bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    BigInt(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Bound as a NULL text parameter. In a [`Condition`] `eq`/`ne`
    /// against `Null` become `IS NULL`/`IS NOT NULL`.
    ///
    /// [`Condition`]: crate::db::Condition
    Null,
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::BigInt(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
