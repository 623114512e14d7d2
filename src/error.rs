//! Error types for the table engine.

use thiserror::Error;

use crate::data_type::DataType;
use crate::value::Value;

/// Result type alias using [DbError].
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors reported by table, index and catalog operations.
#[derive(Debug, Error)]
pub enum DbError {
    // Schema compatibility (union, minus)
    #[error("incompatible tables: different arity ({left} vs {right})")]
    SchemaArity { left: usize, right: usize },

    #[error("incompatible tables: domains disagree at position {position} ({left:?} vs {right:?})")]
    SchemaDomain {
        position: usize,
        left: DataType,
        right: DataType,
    },

    // Name resolution
    #[error("attribute {attribute:?} not found in table {table:?}")]
    AttributeNotFound { table: String, attribute: String },

    // Condition strings
    #[error("malformed condition {condition:?}: {reason}")]
    MalformedCondition { condition: String, reason: String },

    #[error("cannot convert {literal:?} to domain {domain:?}")]
    TypeCoercion { literal: String, domain: DataType },

    // Tuple supply
    #[error("tuple has {actual} values but table {table:?} has {expected} attributes")]
    TupleArity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("value {value:?} does not conform to domain {domain:?} of attribute {attribute:?}")]
    DomainViolation {
        attribute: String,
        domain: DataType,
        value: Value,
    },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown domain name {0:?}")]
    UnknownDomain(String),

    #[error("table {table:?} has no linear hash index to attach {attribute:?} to")]
    IndexUnavailable { table: String, attribute: String },

    // Catalog
    #[error("table {0:?} already exists")]
    TableExists(String),

    #[error("table {0:?} does not exist")]
    TableNotFound(String),

    // Persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(String),
}

impl DbError {
    pub(crate) fn attribute_not_found(table: &str, attribute: &str) -> Self {
        DbError::AttributeNotFound {
            table: table.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn malformed(condition: &str, reason: impl Into<String>) -> Self {
        DbError::MalformedCondition {
            condition: condition.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for DbError {
    fn from(err: bincode::Error) -> Self {
        DbError::Encoding(err.to_string())
    }
}
