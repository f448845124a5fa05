//! Typed query predicates passed to catalog backends.
//!
//! Filters are plain values: the resolver builds them, a backend either
//! evaluates them directly (see [`Filter::matches`]) or translates them into
//! its own query language.

use crate::core::{CollectionRecord, CollectionState, FileType, ShardRecord};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    State(CollectionState),
    FileType(FileType),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<CollectionState> for Value {
    fn from(value: CollectionState) -> Self {
        Value::State(value)
    }
}

impl From<FileType> for Value {
    fn from(value: FileType) -> Self {
        Value::FileType(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{}'", s),
            Value::State(s) => write!(f, "{}", s),
            Value::FileType(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionField {
    TableId,
    OwnerTable,
    State,
    PartitionTag,
}

impl fmt::Display for CollectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollectionField::TableId => "table_id",
            CollectionField::OwnerTable => "owner_table",
            CollectionField::State => "state",
            CollectionField::PartitionTag => "partition_tag",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardField {
    TableId,
    FileType,
}

impl fmt::Display for ShardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShardField::TableId => "table_id",
            ShardField::FileType => "file_type",
        })
    }
}

/// A record whose fields a [`Filter`] can inspect.
pub trait Record {
    type Field;

    fn field(&self, field: Self::Field) -> Value;
}

impl Record for CollectionRecord {
    type Field = CollectionField;

    fn field(&self, field: CollectionField) -> Value {
        match field {
            CollectionField::TableId => Value::Text(self.table_id.clone()),
            CollectionField::OwnerTable => Value::Text(self.owner_table.clone()),
            CollectionField::State => Value::State(self.state),
            CollectionField::PartitionTag => Value::Text(self.partition_tag.clone()),
        }
    }
}

impl Record for ShardRecord {
    type Field = ShardField;

    fn field(&self, field: ShardField) -> Value {
        match field {
            ShardField::TableId => Value::Text(self.table_id.clone()),
            ShardField::FileType => Value::FileType(self.file_type),
        }
    }
}

/// Boolean combination of typed field predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter<F> {
    Eq(F, Value),
    NotEq(F, Value),
    In(F, Vec<Value>),
    /// Empty conjunction is true.
    And(Vec<Filter<F>>),
    /// Empty disjunction is false.
    Or(Vec<Filter<F>>),
}

pub type CollectionFilter = Filter<CollectionField>;
pub type ShardFilter = Filter<ShardField>;

impl<F: Copy> Filter<F> {
    pub fn equals(field: F, value: impl Into<Value>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn not_equals(field: F, value: impl Into<Value>) -> Self {
        Filter::NotEq(field, value.into())
    }

    pub fn one_of<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field, values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Filter<F>) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter<F>) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    pub fn matches<R: Record<Field = F>>(&self, record: &R) -> bool {
        match self {
            Filter::Eq(field, value) => record.field(*field) == *value,
            Filter::NotEq(field, value) => record.field(*field) != *value,
            Filter::In(field, values) => {
                let actual = record.field(*field);
                values.contains(&actual)
            }
            Filter::And(parts) => parts.iter().all(|p| p.matches(record)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}

impl<F: fmt::Display> fmt::Display for Filter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<F: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            parts: &[Filter<F>],
            op: &str,
        ) -> fmt::Result {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                write!(f, "{}", part)?;
            }
            write!(f, ")")
        }

        match self {
            Filter::Eq(field, value) => write!(f, "{} = {}", field, value),
            Filter::NotEq(field, value) => write!(f, "{} != {}", field, value),
            Filter::In(field, values) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN [{}]", field, list.join(", "))
            }
            Filter::And(parts) => join(f, parts, "AND"),
            Filter::Or(parts) => join(f, parts, "OR"),
        }
    }
}
