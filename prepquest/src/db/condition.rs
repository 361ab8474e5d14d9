use crate::db::{Driver, Entity, Statement, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Compare {
    fn as_sql(self) -> &'static str {
        match self {
            Compare::Eq => " = ",
            Compare::Ne => " <> ",
            Compare::Gt => " > ",
            Compare::Ge => " >= ",
            Compare::Lt => " < ",
            Compare::Le => " <= ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        column: String,
        op: Compare,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
}

impl Predicate {
    fn column(&self) -> &str {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::Like { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column) => column,
        }
    }
}

/// Query-by-example filter and ordering for a mapper call.
///
/// Predicates are joined with `AND`; ordering is applied in the order the
/// `order_*` calls were made. Column names are checked against the target
/// entity before any SQL is generated, and values are always bound.
///
/// ```
/// use prepquest::db::Condition;
///
/// let cond = Condition::new()
///     .eq("user_id", 42)
///     .like("title", "rust")
///     .order_desc("create_time");
/// assert!(!cond.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    predicates: Vec<Predicate>,
    orders: Vec<(String, Order)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare(
        mut self,
        column: impl Into<String>,
        op: Compare,
        value: impl Into<Value>,
    ) -> Self {
        self.predicates.push(Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Eq, value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Ne, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Gt, value)
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Ge, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Lt, value)
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, Compare::Le, value)
    }

    /// Substring match: `column LIKE '%needle%'`. `%`, `_` and `\` in
    /// `needle` match themselves.
    pub fn like(
        mut self,
        column: impl Into<String>,
        needle: impl AsRef<str>,
    ) -> Self {
        self.predicates.push(Predicate::Like {
            column: column.into(),
            pattern: format!("%{}%", escape_like(needle.as_ref())),
        });
        self
    }

    /// An empty list matches no rows.
    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicates.push(Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.predicates.push(Predicate::IsNull(column.into()));
        self
    }

    pub fn is_not_null(mut self, column: impl Into<String>) -> Self {
        self.predicates.push(Predicate::IsNotNull(column.into()));
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.orders.push((column.into(), Order::Asc));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.orders.push((column.into(), Order::Desc));
        self
    }

    /// `true` when there are no predicates (ordering is ignored).
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn has_order(&self) -> bool {
        !self.orders.is_empty()
    }

    /// Checks column names against `T` and rejects comparisons that can
    /// never match, such as `> NULL` or `IN (NULL)`.
    pub(crate) fn validate<T: Entity>(&self) -> crate::Result<()> {
        for predicate in &self.predicates {
            let null_operand = match predicate {
                Predicate::Compare {
                    op: Compare::Eq | Compare::Ne,
                    ..
                } => false,
                Predicate::Compare { value, .. } => *value == Value::Null,
                Predicate::In { values, .. } => values.contains(&Value::Null),
                _ => false,
            };
            if null_operand {
                return Err(crate::Error::InvalidQuery(format!(
                    "`{}` cannot be compared with NULL",
                    predicate.column()
                )));
            }
        }

        let columns = self
            .predicates
            .iter()
            .map(Predicate::column)
            .chain(self.orders.iter().map(|(column, _)| column.as_str()));
        for column in columns {
            if !T::has_column(column) {
                return Err(crate::Error::InvalidQuery(format!(
                    "unknown column `{column}` for table `{}`",
                    T::TABLE
                )));
            }
        }
        Ok(())
    }

    /// Appends ` WHERE ...` when there is at least one predicate.
    pub(crate) fn push_where<DB: Driver>(
        &self,
        builder: &mut Statement<'_, DB>,
    ) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                // `= NULL` never matches, so equality with NULL is a null test
                Predicate::Compare {
                    column,
                    op: Compare::Eq,
                    value: Value::Null,
                } => {
                    builder.push(column).push(" IS NULL");
                }
                Predicate::Compare {
                    column,
                    op: Compare::Ne,
                    value: Value::Null,
                } => {
                    builder.push(column).push(" IS NOT NULL");
                }
                Predicate::Compare { column, op, value } => {
                    builder.push(column).push(op.as_sql());
                    builder.push_bind(value.clone());
                }
                Predicate::Like { column, pattern } => {
                    builder.push(column).push(" LIKE ");
                    builder.push_bind(Value::Text(pattern.clone()));
                    builder.push(" ESCAPE '\\'");
                }
                Predicate::In { values, .. } if values.is_empty() => {
                    builder.push("1 = 0");
                }
                Predicate::In { column, values } => {
                    builder.push(column).push(" IN (");
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            builder.push(", ");
                        }
                        builder.push_bind(value.clone());
                    }
                    builder.push(")");
                }
                Predicate::IsNull(column) => {
                    builder.push(column).push(" IS NULL");
                }
                Predicate::IsNotNull(column) => {
                    builder.push(column).push(" IS NOT NULL");
                }
            }
        }
    }

    /// Appends ` ORDER BY ...`, falling back to `default` when no order was
    /// requested.
    pub(crate) fn push_order_by<DB: Driver>(
        &self,
        builder: &mut Statement<'_, DB>,
        default: Option<&str>,
    ) {
        if self.orders.is_empty() {
            if let Some(column) = default {
                builder.push(" ORDER BY ").push(column).push(" ASC");
            }
            return;
        }
        builder.push(" ORDER BY ");
        for (i, (column, order)) in self.orders.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column).push(match order {
                Order::Asc => " ASC",
                Order::Desc => " DESC",
            });
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, Sqlite};

    struct Item;

    impl Entity for Item {
        const TABLE: &'static str = "item";
        const COLUMNS: &'static [&'static str] = &["name", "owner", "note"];

        fn id(&self) -> i64 {
            0
        }

        fn values(&self) -> Vec<Value> {
            Vec::new()
        }
    }

    fn render<DB: Driver>(cond: &Condition) -> String {
        let mut builder = Statement::<DB>::new("SELECT * FROM item");
        cond.push_where(&mut builder);
        cond.push_order_by(&mut builder, None);
        builder.sql().to_string()
    }

    #[test]
    fn test_empty_condition() {
        let cond = Condition::new();
        assert!(cond.is_empty());
        assert_eq!(render::<Postgres>(&cond), "SELECT * FROM item");
    }

    #[test]
    fn test_predicates_postgres() {
        let cond = Condition::new()
            .eq("owner", 7)
            .ne("name", "x")
            .like("note", "rust")
            .is_null("note")
            .order_desc("id")
            .order_asc("name");
        assert_eq!(
            render::<Postgres>(&cond),
            "SELECT * FROM item WHERE owner = $1 AND name <> $2 \
             AND note LIKE $3 ESCAPE '\\' AND note IS NULL \
             ORDER BY id DESC, name ASC"
        );
    }

    #[test]
    fn test_predicates_sqlite() {
        let cond = Condition::new()
            .ge("owner", 1)
            .lt("owner", 9)
            .in_list("name", ["a", "b"]);
        assert_eq!(
            render::<Sqlite>(&cond),
            "SELECT * FROM item WHERE owner >= ? AND owner < ? \
             AND name IN (?, ?)"
        );
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let cond = Condition::new().in_list("id", Vec::<i64>::new());
        assert_eq!(render::<Postgres>(&cond), "SELECT * FROM item WHERE 1 = 0");
    }

    #[test]
    fn test_default_order() {
        let mut builder = Statement::<Postgres>::new("SELECT * FROM item");
        Condition::new().push_order_by(&mut builder, Some("id"));
        assert_eq!(builder.sql(), "SELECT * FROM item ORDER BY id ASC");
    }

    #[test]
    fn test_like_escapes_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like(r"C:\tmp"), r"C:\\tmp");

        let cond = Condition::new().like("note", "50%_off");
        assert_eq!(
            cond.predicates[0],
            Predicate::Like {
                column: "note".into(),
                pattern: r"%50\%\_off%".into(),
            }
        );
    }

    #[test]
    fn test_null_comparisons() {
        let cond = Condition::new()
            .eq("note", None::<String>)
            .ne("owner", None::<i64>);
        assert_eq!(
            render::<Postgres>(&cond),
            "SELECT * FROM item WHERE note IS NULL AND owner IS NOT NULL"
        );
        assert!(cond.validate::<Item>().is_ok());

        let err = Condition::new()
            .gt("owner", None::<i64>)
            .validate::<Item>()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidQuery(_)));

        let err = Condition::new()
            .in_list("owner", [Some(1), None])
            .validate::<Item>()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidQuery(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_columns() {
        assert!(Condition::new().eq("owner", 1).validate::<Item>().is_ok());

        let err = Condition::new()
            .eq("owner = 1 OR 1", 1)
            .validate::<Item>()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidQuery(_)));

        let err = Condition::new()
            .order_desc("created_at")
            .validate::<Item>()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidQuery(_)));
    }
}
