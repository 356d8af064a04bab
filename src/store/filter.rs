use rusqlite::types::Value;

use crate::error::{Error, Result};

/// Conversion of Rust values into catalog column values.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
}

impl Condition {
    fn column(&self) -> &str {
        match self {
            Condition::Eq(c, _)
            | Condition::Ne(c, _)
            | Condition::In(c, _)
            | Condition::NotIn(c, _) => c,
        }
    }
}

/// A chainable row predicate, the catalog's equivalent of a narrowed query set.
///
/// Column names are checked against the entity's column list when the filter is
/// compiled, so they never reach SQL unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    /// Matches every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl IntoValue) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into_value()));
        self
    }

    #[must_use]
    pub fn exclude(mut self, column: &str, value: impl IntoValue) -> Self {
        self.conditions
            .push(Condition::Ne(column.to_string(), value.into_value()));
        self
    }

    #[must_use]
    pub fn is_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.conditions.push(Condition::In(
            column.to_string(),
            values.into_iter().map(IntoValue::into_value).collect(),
        ));
        self
    }

    #[must_use]
    pub fn not_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.conditions.push(Condition::NotIn(
            column.to_string(),
            values.into_iter().map(IntoValue::into_value).collect(),
        ));
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), false));
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), true));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn check_column(table: &'static str, columns: &[&str], column: &str) -> Result<()> {
        if columns.contains(&column) {
            Ok(())
        } else {
            Err(Error::UnknownColumn {
                table,
                column: column.to_string(),
            })
        }
    }

    /// Compiles the WHERE clause. The clause is empty or starts with a space.
    pub(crate) fn where_clause(
        &self,
        table: &'static str,
        columns: &[&str],
    ) -> Result<(String, Vec<Value>)> {
        let mut parts = Vec::with_capacity(self.conditions.len());
        let mut params = Vec::new();

        for condition in &self.conditions {
            Self::check_column(table, columns, condition.column())?;
            match condition {
                Condition::Eq(column, value) => {
                    parts.push(format!("{column} = ?"));
                    params.push(value.clone());
                }
                Condition::Ne(column, value) => {
                    parts.push(format!("{column} <> ?"));
                    params.push(value.clone());
                }
                Condition::In(_, values) if values.is_empty() => parts.push("0".to_string()),
                Condition::NotIn(_, values) if values.is_empty() => {}
                Condition::In(column, values) | Condition::NotIn(column, values) => {
                    let negate = if matches!(condition, Condition::NotIn(..)) {
                        "NOT "
                    } else {
                        ""
                    };
                    let marks = vec!["?"; values.len()].join(", ");
                    parts.push(format!("{column} {negate}IN ({marks})"));
                    params.extend(values.iter().cloned());
                }
            }
        }

        if parts.is_empty() {
            Ok((String::new(), params))
        } else {
            Ok((format!(" WHERE {}", parts.join(" AND ")), params))
        }
    }

    /// Compiles ORDER BY / LIMIT / OFFSET. Rows fall back to insertion order.
    pub(crate) fn tail_clause(&self, table: &'static str, columns: &[&str]) -> Result<String> {
        let mut sql = String::new();
        let mut order = Vec::with_capacity(self.order.len() + 1);
        for (column, desc) in &self.order {
            Self::check_column(table, columns, column)?;
            order.push(format!("{column}{}", if *desc { " DESC" } else { "" }));
        }
        order.push("rowid".to_string());
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Ok(sql)
    }
}
