use std::fmt;
use std::sync::Arc;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An immutable, ordered tuple of values identifying a row or an index entry.
///
/// Two keys are equal when they have the same length and all components are equal.
/// Hashing covers every component, and ordering is lexicographic over components
/// (a strict prefix orders first). Cloning only bumps a reference count, so the
/// same key can be shared by several indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Allocative)]
pub struct CompositeKey(Arc<[Value]>);

impl CompositeKey {
    /// Builds a key from one or more values.
    pub fn new(values: impl Into<Vec<Value>>) -> Self {
        let values: Vec<Value> = values.into();
        debug_assert!(!values.is_empty(), "a composite key needs one component");
        Self(Arc::from(values))
    }

    /// Builds a single-attribute key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(Arc::from(vec![value.into()]))
    }

    /// Extracts the key stored at `positions` of `tuple`, in the order given.
    pub fn project(tuple: &[Value], positions: &[usize]) -> Self {
        Self(positions.iter().map(|&p| tuple[p].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.0.get(i)
    }

    pub fn components(&self) -> &[Value] {
        &self.0
    }
}

impl From<Value> for CompositeKey {
    fn from(value: Value) -> Self {
        Self::single(value)
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}
