//! Unary and set operators of the relational algebra.
//!
//! Every operator reads its operands and builds a new [Table]; operands are
//! never modified. Tuples that pass through unchanged are shared with the
//! result rather than copied.

use bitvec::prelude::*;
use tracing::{debug, warn};

use crate::condition::Condition;
use crate::error::Result;
use crate::key::CompositeKey;
use crate::lin_hash::LinearHashMap;
use crate::table::{Schema, Table, Tuple};
use crate::value::Value;

impl Table {
    /// Keeps the given attributes, in the given order, and drops duplicate rows.
    ///
    /// The result keeps this table's key if every key attribute is projected,
    /// and is keyed on all of `attributes` otherwise.
    pub fn project<S: AsRef<str>>(&self, attributes: &[S]) -> Result<Table> {
        let names: Vec<&str> = attributes.iter().map(AsRef::as_ref).collect();
        debug!(table = %self.name(), attributes = ?names, "project");
        let positions = self.resolve_all(&names)?;

        let columns = positions
            .iter()
            .map(|&p| self.schema().columns()[p].clone())
            .collect();
        let key = if self.schema().key().iter().all(|k| names.contains(&k.as_str())) {
            self.schema().key().to_vec()
        } else {
            names.iter().map(|n| n.to_string()).collect()
        };
        let mut result = self.empty_like(Schema::new(columns, key)?);

        for tuple in self.tuples() {
            let row: Tuple = positions.iter().map(|&p| tuple[p].clone()).collect();
            let duplicate = if self.strategy().is_indexed() {
                result.lookup(&result.key_of(&row)).is_some()
            } else {
                result.tuples().contains(&row)
            };
            if !duplicate {
                result.append(row);
            }
        }
        Ok(result)
    }

    /// [Table::project] with a space-separated attribute list, e.g. `"title year"`.
    pub fn project_str(&self, attributes: &str) -> Result<Table> {
        let names: Vec<&str> = attributes.split_whitespace().collect();
        self.project(&names)
    }

    /// Keeps the tuples satisfying `predicate`.
    pub fn select_by<F>(&self, predicate: F) -> Table
    where
        F: Fn(&[Value]) -> bool,
    {
        debug!(table = %self.name(), "select by predicate");
        let rows = self
            .tuples()
            .iter()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        self.derive(self.schema().clone(), rows)
    }

    /// Keeps the tuples satisfying a condition such as `"year < 1980"` or
    /// `"status == active"`.
    ///
    /// # Errors
    /// [MalformedCondition](crate::DbError::MalformedCondition) unless the condition has
    /// three tokens and a known operator,
    /// [AttributeNotFound](crate::DbError::AttributeNotFound) for an unknown attribute,
    /// [TypeCoercion](crate::DbError::TypeCoercion) when the literal does not fit the
    /// attribute's domain. Nothing is scanned when parsing fails.
    pub fn select_where(&self, condition: &str) -> Result<Table> {
        debug!(table = %self.name(), condition, "select where");
        let condition = Condition::parse(condition, self)?;
        Ok(self.select_by(|t| condition.matches(t)))
    }

    /// Exact-match selection on a key value. Returns a table with zero or one
    /// tuple; when several tuples share the key, the latest one.
    ///
    /// Uses the primary index when the table has one; otherwise indexes the
    /// first `key.len()` attributes for this call.
    pub fn select_key(&self, key: &CompositeKey) -> Table {
        debug!(table = %self.name(), %key, "select key");
        let hit = match self.primary_index() {
            Some(index) => index.get(key).cloned(),
            None => {
                let width = key.len().min(self.schema().arity());
                let positions: Vec<usize> = (0..width).collect();
                let mut index = LinearHashMap::with_config(self.index_config());
                for tuple in self.tuples() {
                    index.put(CompositeKey::project(tuple, &positions), tuple.clone());
                }
                index.get(key).cloned()
            }
        };
        self.derive(self.schema().clone(), hit.into_iter().collect())
    }

    /// Rows of this table followed by the rows of `other` not already present,
    /// without duplicate rows.
    ///
    /// # Errors
    /// [SchemaArity](crate::DbError::SchemaArity) or
    /// [SchemaDomain](crate::DbError::SchemaDomain) when the schemas are incompatible.
    pub fn union(&self, other: &Table) -> Result<Table> {
        debug!(left = %self.name(), right = %other.name(), "union");
        self.check_compatible(other)?;

        let mut rows: Vec<Tuple> = Vec::with_capacity(self.len() + other.len());
        let all = self.tuples().iter().chain(other.tuples());
        if self.strategy().is_indexed() {
            let mut seen = LinearHashMap::with_config(self.index_config());
            for tuple in all {
                if seen.put(CompositeKey::new(tuple.to_vec()), ()).is_none() {
                    rows.push(tuple.clone());
                }
            }
        } else {
            for tuple in all {
                if !rows.contains(tuple) {
                    rows.push(tuple.clone());
                }
            }
        }
        Ok(self.derive(self.schema().clone(), rows))
    }

    /// Rows of this table whose key does not appear at the same positions in
    /// any row of `other`.
    ///
    /// # Errors
    /// Same as [Table::union].
    pub fn minus(&self, other: &Table) -> Result<Table> {
        debug!(left = %self.name(), right = %other.name(), "minus");
        self.check_compatible(other)?;

        let key = self.key_columns();
        let mut removed = bitvec![0; self.len()];
        if self.strategy().is_indexed() {
            let mut rows = LinearHashMap::multi(self.index_config());
            for (i, tuple) in self.tuples().iter().enumerate() {
                rows.put(CompositeKey::project(tuple, key), i);
            }
            for tuple in other.tuples() {
                let other_key = CompositeKey::project(tuple, key);
                for &i in rows.get_all(&other_key) {
                    removed.set(i, true);
                }
            }
        } else {
            for (i, tuple) in self.tuples().iter().enumerate() {
                let present = other
                    .tuples()
                    .iter()
                    .any(|o| key.iter().all(|&c| o[c] == tuple[c]));
                removed.set(i, present);
            }
        }

        let rows = self
            .tuples()
            .iter()
            .zip(removed.iter())
            .filter(|(_, gone)| !**gone)
            .map(|(t, _)| t.clone())
            .collect();
        Ok(self.derive(self.schema().clone(), rows))
    }

    fn check_compatible(&self, other: &Table) -> Result<()> {
        self.schema().compatible(other.schema()).inspect_err(|err| {
            warn!(left = %self.name(), right = %other.name(), %err, "incompatible schemas");
        })
    }
}
