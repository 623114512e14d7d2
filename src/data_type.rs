use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::value::Value;

/// The domain of an attribute.
/// Every value stored under an attribute must have the attribute's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit floating-point number.
    Float,
    /// A variable-length UTF-8 character string.
    Text,
    /// A boolean value (true or false).
    Bool,
}

impl DataType {
    /// Converts a literal taken from a condition string into a value of this domain.
    ///
    /// Text literals may optionally be wrapped in single quotes, which are stripped.
    /// Booleans accept `true`/`false` in any case.
    ///
    /// # Errors
    /// Returns [DbError::TypeCoercion] when the literal cannot be read as this domain.
    ///
    /// # Example
    /// ```
    /// # use reldb::{DataType, Value};
    /// assert_eq!(DataType::Int.coerce("1977").unwrap(), Value::Int(1977));
    /// assert!(DataType::Int.coerce("nineteen").is_err());
    /// ```
    pub fn coerce(self, literal: &str) -> Result<Value> {
        let fail = || DbError::TypeCoercion {
            literal: literal.to_string(),
            domain: self,
        };
        match self {
            DataType::Int => literal.parse().map(Value::Int).map_err(|_| fail()),
            DataType::Float => literal.parse().map(Value::Float).map_err(|_| fail()),
            DataType::Bool => match literal.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            DataType::Text => {
                let unquoted = literal
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .unwrap_or(literal);
                Ok(Value::Text(Arc::from(unquoted)))
            }
        }
    }
}

impl FromStr for DataType {
    type Err = DbError;

    /// Accepts the short names (`int`, `text`, ...) and the boxed-type names used by
    /// schema strings such as `"Integer String Double"`.
    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" | "long" | "short" | "byte" => Ok(DataType::Int),
            "float" | "double" | "real" => Ok(DataType::Float),
            "text" | "string" | "character" | "char" => Ok(DataType::Text),
            "bool" | "boolean" => Ok(DataType::Bool),
            _ => Err(DbError::UnknownDomain(name.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "Int",
            DataType::Float => "Float",
            DataType::Text => "Text",
            DataType::Bool => "Bool",
        };
        f.write_str(name)
    }
}
