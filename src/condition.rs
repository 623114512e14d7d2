//! Condition strings of the form `"attr op literal"` and `"attr1 op attr2"`.
//!
//! Conditions are parsed and resolved against schemas before any tuple is
//! touched, so malformed input never produces a partial result.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{DbError, Result};
use crate::table::Table;
use crate::value::Value;

/// A comparison between two values of the same domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// Applies the operator using the natural ordering of [Value].
    pub fn eval(self, left: &Value, right: &Value) -> bool {
        let ord = left.cmp(right);
        match self {
            ComparisonOp::Eq => ord == Ordering::Equal,
            ComparisonOp::Ne => ord != Ordering::Equal,
            ComparisonOp::Lt => ord == Ordering::Less,
            ComparisonOp::Le => ord != Ordering::Greater,
            ComparisonOp::Gt => ord == Ordering::Greater,
            ComparisonOp::Ge => ord != Ordering::Less,
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = DbError;

    fn from_str(op: &str) -> Result<Self> {
        match op {
            "==" | "=" => Ok(ComparisonOp::Eq),
            "!=" | "<>" => Ok(ComparisonOp::Ne),
            "<" => Ok(ComparisonOp::Lt),
            "<=" => Ok(ComparisonOp::Le),
            ">" => Ok(ComparisonOp::Gt),
            ">=" => Ok(ComparisonOp::Ge),
            _ => Err(DbError::malformed(op, "unsupported comparison operator")),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Splits a condition into exactly three whitespace-separated tokens.
fn tokens(condition: &str) -> Result<[&str; 3]> {
    let parts: Vec<&str> = condition.split_whitespace().collect();
    match parts.as_slice() {
        [a, op, b] => Ok([*a, *op, *b]),
        _ => Err(DbError::malformed(
            condition,
            format!("expected 3 tokens, found {}", parts.len()),
        )),
    }
}

fn operator(condition: &str, op: &str) -> Result<ComparisonOp> {
    op.parse()
        .map_err(|_| DbError::malformed(condition, format!("unsupported operator {op:?}")))
}

/// `attr op literal`, resolved against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: usize,
    pub op: ComparisonOp,
    pub literal: Value,
}

impl Condition {
    /// Parses `condition` against `table`'s schema, coercing the literal to the
    /// attribute's domain.
    pub fn parse(condition: &str, table: &Table) -> Result<Self> {
        let [attribute, op, literal] = tokens(condition)?;
        let op = operator(condition, op)?;
        let column = table.resolve(attribute)?;
        let domain = table
            .schema()
            .domain(column)
            .ok_or_else(|| DbError::attribute_not_found(table.name(), attribute))?;
        Ok(Self {
            column,
            op,
            literal: domain.coerce(literal)?,
        })
    }

    pub fn matches(&self, tuple: &[Value]) -> bool {
        self.op.eval(&tuple[self.column], &self.literal)
    }
}

/// `attr1 op attr2`, with `attr1` resolved in the left table and `attr2` in the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThetaCondition {
    pub left: usize,
    pub op: ComparisonOp,
    pub right: usize,
}

impl ThetaCondition {
    pub fn parse(condition: &str, left: &Table, right: &Table) -> Result<Self> {
        let [a, op, b] = tokens(condition)?;
        let op = operator(condition, op)?;
        let (l, r) = (left.resolve(a)?, right.resolve(b)?);
        left.check_same_domain(l, right, r)?;
        Ok(Self {
            left: l,
            op,
            right: r,
        })
    }

    pub fn matches(&self, left: &[Value], right: &[Value]) -> bool {
        self.op.eval(&left[self.left], &right[self.right])
    }
}
