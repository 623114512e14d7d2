//! Join operators.
//!
//! Joined rows are the left tuple followed by the right tuple. When a right
//! attribute name is already taken, the output schema renames it by appending
//! `2` until the name is free; the right operand keeps its own names.

use bitvec::prelude::*;
use tracing::debug;

use crate::condition::ThetaCondition;
use crate::error::{DbError, Result};
use crate::key::CompositeKey;
use crate::lin_hash::LinearHashMap;
use crate::table::{ColumnDef, Schema, Table, Tuple};
use crate::value::Value;

fn concat(left: &[Value], right: &[Value]) -> Tuple {
    left.iter().chain(right).cloned().collect()
}

impl Table {
    /// Equi-join by nested loops: keeps pairs equal on every
    /// `attributes1[i] == attributes2[i]`.
    ///
    /// # Errors
    /// [DbError::MalformedCondition] when the attribute lists are empty or differ
    /// in length, [DbError::AttributeNotFound] for unknown attributes,
    /// [DbError::SchemaDomain] when paired attributes have different domains.
    pub fn join<S: AsRef<str>>(
        &self,
        attributes1: &[S],
        attributes2: &[S],
        other: &Table,
    ) -> Result<Table> {
        let (left, right) = self.join_columns(attributes1, attributes2, other)?;
        debug!(left = %self.name(), right = %other.name(), left_columns = ?left, right_columns = ?right, "nested loop join");

        let mut rows = Vec::new();
        for l in self.tuples() {
            for r in other.tuples() {
                if left.iter().zip(&right).all(|(&a, &b)| l[a] == r[b]) {
                    rows.push(concat(l, r));
                }
            }
        }
        Ok(self.derive(self.joined_schema(other)?, rows))
    }

    /// [Table::join] with space-separated attribute lists, e.g. `join_str("sid", "sid", &takes)`.
    pub fn join_str(&self, attributes1: &str, attributes2: &str, other: &Table) -> Result<Table> {
        let a: Vec<&str> = attributes1.split_whitespace().collect();
        let b: Vec<&str> = attributes2.split_whitespace().collect();
        self.join(&a, &b, other)
    }

    /// Equi-join that indexes this table on the join attributes and looks it up
    /// once per tuple of `other`. Same output as [Table::join], with rows grouped
    /// by `other`'s order.
    ///
    /// A secondary index on the (single) join attribute is used when one exists.
    pub fn indexed_join<S: AsRef<str>>(
        &self,
        attributes1: &[S],
        attributes2: &[S],
        other: &Table,
    ) -> Result<Table> {
        let (left, right) = self.join_columns(attributes1, attributes2, other)?;
        let schema = self.joined_schema(other)?;
        let mut rows = Vec::new();

        if let ([attribute], [column]) = (attributes1, right.as_slice())
            && self.has_secondary_index(attribute.as_ref())
        {
            debug!(left = %self.name(), right = %other.name(), attribute = attribute.as_ref(), "indexed join on secondary index");
            for r in other.tuples() {
                let matches = self.lookup_by(attribute.as_ref(), &r[*column]).unwrap_or(&[]);
                rows.extend(matches.iter().map(|l| concat(l, r)));
            }
            return Ok(self.derive(schema, rows));
        }

        debug!(left = %self.name(), right = %other.name(), left_columns = ?left, right_columns = ?right, "indexed join");
        let mut index: LinearHashMap<CompositeKey, Vec<Tuple>> =
            LinearHashMap::with_config(self.index_config());
        for l in self.tuples() {
            let key = CompositeKey::project(l, &left);
            match index.get_mut(&key) {
                Some(group) => group.push(l.clone()),
                None => {
                    index.put(key, vec![l.clone()]);
                }
            }
        }
        for r in other.tuples() {
            if let Some(group) = index.get(&CompositeKey::project(r, &right)) {
                rows.extend(group.iter().map(|l| concat(l, r)));
            }
        }
        Ok(self.derive(schema, rows))
    }

    /// Joins on a comparison between one attribute of each table, e.g.
    /// `"year >= founded"`. Both compared attributes are kept, and must share
    /// a domain.
    pub fn theta_join(&self, condition: &str, other: &Table) -> Result<Table> {
        debug!(left = %self.name(), right = %other.name(), condition, "theta join");
        let theta = ThetaCondition::parse(condition, self, other)?;
        let schema = self.joined_schema(other)?;

        let mut rows = Vec::new();
        for l in self.tuples() {
            for r in other.tuples() {
                if theta.matches(l, r) {
                    rows.push(concat(l, r));
                }
            }
        }
        Ok(self.derive(schema, rows))
    }

    /// Joins on equality of every attribute name the two schemas share.
    ///
    /// Shared attributes appear once, from this table. Without shared
    /// attributes the result is the cartesian product.
    pub fn natural_join(&self, other: &Table) -> Result<Table> {
        let mut shared = bitvec![0; other.schema().arity()];
        let mut pairs = Vec::new();
        for (j, name) in other.schema().attributes().enumerate() {
            if let Some(i) = self.col(name) {
                shared.set(j, true);
                pairs.push((i, j));
            }
        }
        debug!(left = %self.name(), right = %other.name(), ?pairs, "natural join");

        let mut columns = self.schema().columns().to_vec();
        columns.extend(
            other
                .schema()
                .columns()
                .iter()
                .zip(shared.iter())
                .filter(|(_, s)| !**s)
                .map(|(c, _)| c.clone()),
        );
        let mut key = self.schema().key().to_vec();
        for k in other.schema().key() {
            if !key.contains(k) {
                key.push(k.clone());
            }
        }
        let schema = Schema::new(columns, key)?;

        let mut rows = Vec::new();
        for l in self.tuples() {
            for r in other.tuples() {
                if pairs.iter().all(|&(i, j)| l[i] == r[j]) {
                    let row: Tuple = l
                        .iter()
                        .chain(r.iter().zip(shared.iter()).filter(|(_, s)| !**s).map(|(v, _)| v))
                        .cloned()
                        .collect();
                    rows.push(row);
                }
            }
        }
        Ok(self.derive(schema, rows))
    }

    fn join_columns<S: AsRef<str>>(
        &self,
        attributes1: &[S],
        attributes2: &[S],
        other: &Table,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        if attributes1.is_empty() || attributes1.len() != attributes2.len() {
            let names = |a: &[S]| a.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join(" ");
            return Err(DbError::malformed(
                &format!("{} = {}", names(attributes1), names(attributes2)),
                "join needs the same non-zero number of attributes on both sides",
            ));
        }
        let (left, right) = (self.resolve_all(attributes1)?, other.resolve_all(attributes2)?);
        for (&a, &b) in left.iter().zip(&right) {
            self.check_same_domain(a, other, b)?;
        }
        Ok((left, right))
    }

    /// This schema followed by `other`'s, with colliding right names renamed.
    fn joined_schema(&self, other: &Table) -> Result<Schema> {
        let mut columns = self.schema().columns().to_vec();
        let mut renamed = Vec::with_capacity(other.schema().arity());
        for column in other.schema().columns() {
            let mut name = column.name.clone();
            while columns.iter().any(|c| c.name == name) {
                name.push('2');
            }
            renamed.push(name.clone());
            columns.push(ColumnDef::new(name, column.data_type));
        }

        let mut key = self.schema().key().to_vec();
        for k in other.schema().key() {
            if let Some(j) = other.col(k) {
                key.push(renamed[j].clone());
            }
        }
        Schema::new(columns, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::index::IndexStrategy;

    fn student(strategy: IndexStrategy) -> Table {
        let schema =
            Schema::parse("sid name address status", "Integer String String String", "sid").unwrap();
        Table::with_tuples(
            "Student",
            schema,
            [
                vec![Value::Int(1), "Alice".into(), "A St".into(), "active".into()],
                vec![Value::Int(2), "Bob".into(), "B St".into(), "inactive".into()],
                vec![Value::Int(3), "Cara".into(), "C St".into(), "inactive".into()],
            ],
            strategy,
        )
        .unwrap()
    }

    fn takes(strategy: IndexStrategy) -> Table {
        let schema = Schema::parse("sid cid", "Integer Integer", "sid cid").unwrap();
        Table::with_tuples(
            "Takes",
            schema,
            [
                vec![Value::Int(1), Value::Int(101)],
                vec![Value::Int(4), Value::Int(102)],
            ],
            strategy,
        )
        .unwrap()
    }

    fn alice_takes_101() -> Vec<Value> {
        vec![
            Value::Int(1),
            "Alice".into(),
            "A St".into(),
            "active".into(),
            Value::Int(1),
            Value::Int(101),
        ]
    }

    // ─────────────────────────────────────────────
    // Test 1 : nested loop join and collision renaming
    // ─────────────────────────────────────────────
    #[test]
    fn test_nested_loop_join() {
        let student = student(IndexStrategy::LinearHash);
        let takes = takes(IndexStrategy::LinearHash);
        let joined = student.join_str("sid", "sid", &takes).unwrap();

        assert_eq!(joined.len(), 1);
        assert_eq!(joined.get_row(0).unwrap().as_ref(), alice_takes_101().as_slice());

        let names: Vec<_> = joined.schema().attributes().collect();
        assert_eq!(names, ["sid", "name", "address", "status", "sid2", "cid"]);
        assert_eq!(joined.schema().key(), &["sid", "sid2", "cid"]);

        // right operand untouched
        assert_eq!(takes.schema().attributes().next(), Some("sid"));
    }

    // ─────────────────────────────────────────────
    // Test 2 : indexed join matches the nested loop join
    // ─────────────────────────────────────────────
    #[test]
    fn test_indexed_join_matches_nested_loop() {
        for strategy in [IndexStrategy::NoIndex, IndexStrategy::LinearHash] {
            let student = student(strategy);
            let takes = takes(strategy);
            let nested = student.join(&["sid"], &["sid"], &takes).unwrap();
            let indexed = student.indexed_join(&["sid"], &["sid"], &takes).unwrap();
            assert_eq!(indexed.tuples(), nested.tuples(), "{strategy:?}");
            assert_eq!(indexed.schema(), nested.schema());
        }
    }

    #[test]
    fn test_indexed_join_uses_secondary_index() {
        let mut takes = takes(IndexStrategy::LinearHash);
        takes.create_index("sid").unwrap();
        takes.insert(vec![Value::Int(1), Value::Int(102)]).unwrap();
        let student = student(IndexStrategy::LinearHash);

        let joined = takes.indexed_join(&["sid"], &["sid"], &student).unwrap();
        let nested = takes.join(&["sid"], &["sid"], &student).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.tuples(), nested.tuples());
    }

    // ─────────────────────────────────────────────
    // Test 3 : join argument errors
    // ─────────────────────────────────────────────
    #[test]
    fn test_join_errors() {
        let student = student(IndexStrategy::LinearHash);
        let takes = takes(IndexStrategy::LinearHash);
        assert!(matches!(
            student.join_str("sid name", "sid", &takes),
            Err(DbError::MalformedCondition { .. })
        ));
        assert!(matches!(
            student.indexed_join(&["sid"], &["grade"], &takes),
            Err(DbError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_join_domain_mismatch() {
        let student = student(IndexStrategy::LinearHash);
        let takes = takes(IndexStrategy::LinearHash);
        assert!(matches!(
            student.join_str("name", "sid", &takes),
            Err(DbError::SchemaDomain {
                left: DataType::Text,
                right: DataType::Int,
                ..
            })
        ));
        assert!(matches!(
            student.indexed_join(&["sid", "name"], &["sid", "cid"], &takes),
            Err(DbError::SchemaDomain { position: 1, .. })
        ));
        assert!(matches!(
            student.theta_join("sid < name", &student),
            Err(DbError::SchemaDomain { .. })
        ));
    }

    // ─────────────────────────────────────────────
    // Test 3b : a secondary index sees tuples whose key repeats
    // ─────────────────────────────────────────────
    fn enrolment(index_first: bool) -> Table {
        let schema = Schema::parse("sid cid", "Integer Integer", "sid").unwrap();
        let mut table = Table::new("Enrolment", schema);
        if index_first {
            table.create_index("sid").unwrap();
            table.create_index("cid").unwrap();
        }
        table.insert(vec![Value::Int(1), Value::Int(101)]).unwrap();
        table.insert(vec![Value::Int(1), Value::Int(102)]).unwrap();
        if !index_first {
            table.create_index("sid").unwrap();
            table.create_index("cid").unwrap();
        }
        table
    }

    #[test]
    fn test_secondary_index_with_repeated_keys() {
        let student = student(IndexStrategy::LinearHash);
        for index_first in [true, false] {
            let enrolment = enrolment(index_first);
            assert_eq!(enrolment.lookup_by("sid", &Value::Int(1)).unwrap().len(), 2);
            assert_eq!(enrolment.lookup_by("cid", &Value::Int(101)).unwrap().len(), 1);

            let nested = enrolment.join_str("sid", "sid", &student).unwrap();
            let indexed = enrolment.indexed_join(&["sid"], &["sid"], &student).unwrap();
            assert_eq!(nested.len(), 2, "index_first = {index_first}");
            assert_eq!(indexed.tuples(), nested.tuples());
        }
    }

    // ─────────────────────────────────────────────
    // Test 4 : theta join keeps both compared attributes
    // ─────────────────────────────────────────────
    #[test]
    fn test_theta_join() {
        let student = student(IndexStrategy::LinearHash);
        let takes = takes(IndexStrategy::LinearHash);

        let less = student.theta_join("sid < sid", &takes).unwrap();
        // (1,4) (2,4) (3,4)
        assert_eq!(less.len(), 3);
        assert_eq!(less.schema().arity(), 6);

        let equal = student.theta_join("sid == sid", &takes).unwrap();
        assert_eq!(equal.tuples(), student.join_str("sid", "sid", &takes).unwrap().tuples());

        assert!(student.theta_join("sid < ", &takes).is_err());
    }

    // ─────────────────────────────────────────────
    // Test 5 : natural join keeps shared attributes once
    // ─────────────────────────────────────────────
    #[test]
    fn test_natural_join() {
        let student = student(IndexStrategy::HashMap);
        let takes = takes(IndexStrategy::HashMap);
        let joined = student.natural_join(&takes).unwrap();

        let names: Vec<_> = joined.schema().attributes().collect();
        assert_eq!(names, ["sid", "name", "address", "status", "cid"]);
        assert_eq!(joined.schema().key(), &["sid", "cid"]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.get_row(0).unwrap()[4], Value::Int(101));
    }

    #[test]
    fn test_natural_join_without_shared_attributes() {
        let student = student(IndexStrategy::LinearHash);
        let course = Table::with_tuples(
            "Course",
            Schema::parse("cid title", "Integer String", "cid").unwrap(),
            [
                vec![Value::Int(101), "Algebra".into()],
                vec![Value::Int(102), "Logic".into()],
            ],
            IndexStrategy::LinearHash,
        )
        .unwrap();
        let product = student.natural_join(&course).unwrap();
        assert_eq!(product.len(), student.len() * course.len());
    }
}
