use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IndexConfig;
use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::index::{IndexStrategy, KeyIndex};
use crate::key::CompositeKey;
use crate::value::Value;

/// A row of a table. Tuples are immutable once inserted, so result tables
/// share them with their inputs instead of copying.
pub type Tuple = Arc<[Value]>;

/// Suffix source for the names of derived tables.
static DERIVED: AtomicUsize = AtomicUsize::new(0);

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Attribute names with their domains, plus the attributes forming the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    key: Vec<String>,
}

impl Schema {
    /// Builds a schema. An empty `key` makes every attribute part of the key.
    ///
    /// # Errors
    /// [DbError::InvalidSchema] on duplicate attribute names or an empty column list,
    /// [DbError::AttributeNotFound] when a key attribute is not a column.
    pub fn new(columns: Vec<ColumnDef>, key: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(DbError::InvalidSchema("a schema needs one attribute".into()));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::InvalidSchema(format!(
                    "duplicate attribute {:?}",
                    column.name
                )));
            }
        }
        let key = if key.is_empty() {
            columns.iter().map(|c| c.name.clone()).collect()
        } else {
            key
        };
        if let Some(missing) = key.iter().find(|k| !columns.iter().any(|c| &c.name == *k)) {
            return Err(DbError::attribute_not_found("<schema>", missing));
        }
        Ok(Self { columns, key })
    }

    /// Builds a schema from space-separated attribute, domain and key lists.
    ///
    /// # Example
    /// ```
    /// # use reldb::{DataType, Schema};
    /// let schema = Schema::parse("sid cid", "Integer Integer", "sid cid").unwrap();
    /// assert_eq!(schema.arity(), 2);
    /// assert_eq!(schema.domain(1), Some(DataType::Int));
    /// ```
    pub fn parse(attributes: &str, domains: &str, key: &str) -> Result<Self> {
        let names: Vec<&str> = attributes.split_whitespace().collect();
        let types = domains
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<DataType>>>()?;
        if names.len() != types.len() {
            return Err(DbError::InvalidSchema(format!(
                "{} attributes but {} domains",
                names.len(),
                types.len()
            )));
        }
        let columns = names
            .into_iter()
            .zip(types)
            .map(|(name, data_type)| ColumnDef::new(name, data_type))
            .collect();
        Self::new(columns, key.split_whitespace().map(String::from).collect())
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn domains(&self) -> impl Iterator<Item = DataType> + '_ {
        self.columns.iter().map(|c| c.data_type)
    }

    pub fn domain(&self, column: usize) -> Option<DataType> {
        self.columns.get(column).map(|c| c.data_type)
    }

    /// Column position of an attribute.
    pub fn col(&self, attribute: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == attribute)
    }

    pub(crate) fn key_positions(&self) -> Vec<usize> {
        // Key attributes are validated in `new`.
        self.key.iter().filter_map(|k| self.col(k)).collect()
    }

    /// Checks that both schemas have the same arity and the same domain at
    /// every position.
    pub fn compatible(&self, other: &Schema) -> Result<()> {
        if self.arity() != other.arity() {
            return Err(DbError::SchemaArity {
                left: self.arity(),
                right: other.arity(),
            });
        }
        match self
            .domains()
            .zip(other.domains())
            .position(|(l, r)| l != r)
        {
            Some(position) => Err(DbError::SchemaDomain {
                position,
                left: self.columns[position].data_type,
                right: other.columns[position].data_type,
            }),
            None => Ok(()),
        }
    }
}

/// A relation: a schema, an ordered list of tuples, and an optional primary
/// index from each tuple's key to the tuple.
pub struct Table {
    name: String,
    schema: Schema,
    tuples: Vec<Tuple>,
    key_columns: Vec<usize>,
    strategy: IndexStrategy,
    config: IndexConfig,
    index: Option<Box<dyn KeyIndex<Tuple>>>,
}

impl Table {
    /// Creates an empty table indexed with the default strategy.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self::with_strategy(name, schema, IndexStrategy::default(), IndexConfig::default())
    }

    /// Creates an empty table whose primary index uses `strategy`.
    pub fn with_strategy(
        name: impl Into<String>,
        schema: Schema,
        strategy: IndexStrategy,
        config: IndexConfig,
    ) -> Self {
        let name = name.into();
        debug!(table = %name, ?strategy, attributes = ?schema.attributes().collect::<Vec<_>>(), "create table");
        Self {
            name,
            key_columns: schema.key_positions(),
            schema,
            tuples: Vec::new(),
            strategy,
            config,
            index: strategy.primary(&config),
        }
    }

    /// Creates a table from a list of tuples, checking each like [Table::insert].
    pub fn with_tuples(
        name: impl Into<String>,
        schema: Schema,
        tuples: impl IntoIterator<Item = Vec<Value>>,
        strategy: IndexStrategy,
    ) -> Result<Self> {
        Self::with_tuples_config(name, schema, tuples, strategy, IndexConfig::default())
    }

    /// [Table::with_tuples] with an explicit index configuration.
    pub fn with_tuples_config(
        name: impl Into<String>,
        schema: Schema,
        tuples: impl IntoIterator<Item = impl Into<Tuple>>,
        strategy: IndexStrategy,
        config: IndexConfig,
    ) -> Result<Self> {
        let mut table = Self::with_strategy(name, schema, strategy, config);
        for tuple in tuples {
            table.insert(tuple)?;
        }
        Ok(table)
    }

    /// An empty result table named after this one, with this table's strategy.
    pub(crate) fn empty_like(&self, schema: Schema) -> Self {
        let name = format!("{}{}", self.name, DERIVED.fetch_add(1, Ordering::Relaxed));
        Self::with_strategy(name, schema, self.strategy, self.config)
    }

    /// Like [Table::empty_like], filled with already-checked tuples.
    pub(crate) fn derive(&self, schema: Schema, tuples: Vec<Tuple>) -> Self {
        let mut table = self.empty_like(schema);
        for tuple in tuples {
            table.append(tuple);
        }
        table
    }

    /// Inserts a tuple and returns its position.
    ///
    /// # Errors
    /// [DbError::TupleArity] if the tuple does not have one value per attribute,
    /// [DbError::DomainViolation] if a value is outside its attribute's domain.
    pub fn insert(&mut self, values: impl Into<Tuple>) -> Result<usize> {
        let tuple: Tuple = values.into();
        if tuple.len() != self.schema.arity() {
            return Err(DbError::TupleArity {
                table: self.name.clone(),
                expected: self.schema.arity(),
                actual: tuple.len(),
            });
        }
        for (value, column) in tuple.iter().zip(self.schema.columns()) {
            if value.data_type() != column.data_type {
                return Err(DbError::DomainViolation {
                    attribute: column.name.clone(),
                    domain: column.data_type,
                    value: value.clone(),
                });
            }
        }
        Ok(self.append(tuple))
    }

    pub(crate) fn append(&mut self, tuple: Tuple) -> usize {
        if let Some(index) = self.index.as_mut() {
            index.put(CompositeKey::project(&tuple, &self.key_columns), tuple.clone());
        }
        self.tuples.push(tuple);
        self.tuples.len() - 1
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn strategy(&self) -> IndexStrategy {
        self.strategy
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn get_row(&self, row_idx: usize) -> Option<&Tuple> {
        self.tuples.get(row_idx)
    }

    /// Column position of an attribute.
    pub fn col(&self, attribute: &str) -> Option<usize> {
        self.schema.col(attribute)
    }

    pub(crate) fn resolve(&self, attribute: &str) -> Result<usize> {
        self.col(attribute)
            .ok_or_else(|| DbError::attribute_not_found(&self.name, attribute))
    }

    pub(crate) fn resolve_all<S: AsRef<str>>(&self, attributes: &[S]) -> Result<Vec<usize>> {
        attributes.iter().map(|a| self.resolve(a.as_ref())).collect()
    }

    /// Fails with [DbError::SchemaDomain] unless `column` of this table and
    /// `other_column` of `other` have the same domain.
    pub(crate) fn check_same_domain(
        &self,
        column: usize,
        other: &Table,
        other_column: usize,
    ) -> Result<()> {
        match (self.schema.domain(column), other.schema.domain(other_column)) {
            (Some(left), Some(right)) if left != right => Err(DbError::SchemaDomain {
                position: column,
                left,
                right,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    pub(crate) fn primary_index(&self) -> Option<&dyn KeyIndex<Tuple>> {
        self.index.as_deref()
    }

    /// Projects a tuple onto this table's key attributes.
    pub fn key_of(&self, tuple: &[Value]) -> CompositeKey {
        CompositeKey::project(tuple, &self.key_columns)
    }

    /// Finds the tuple with the given key, through the primary index when
    /// there is one and by scanning otherwise. When several tuples share the
    /// key, the most recently inserted one is returned.
    pub fn lookup(&self, key: &CompositeKey) -> Option<&Tuple> {
        match &self.index {
            Some(index) => index.get(key),
            None => self.tuples.iter().rev().find(|t| &self.key_of(t) == key),
        }
    }

    /// Registers a secondary index on `attribute`, covering every stored tuple.
    ///
    /// # Errors
    /// [DbError::AttributeNotFound] for an unknown attribute, and
    /// [DbError::IndexUnavailable] unless the table uses [IndexStrategy::LinearHash].
    pub fn create_index(&mut self, attribute: &str) -> Result<()> {
        self.register_secondary(attribute, false)
    }

    /// Registers a secondary index keeping only the latest tuple per value.
    pub fn create_unique_index(&mut self, attribute: &str) -> Result<()> {
        self.register_secondary(attribute, true)
    }

    // Backfills from the tuple list: the primary map drops tuples whose key repeats.
    fn register_secondary(&mut self, attribute: &str, unique: bool) -> Result<()> {
        let column = self.resolve(attribute)?;
        let index = self
            .index
            .as_mut()
            .and_then(|i| i.as_linear_hash_mut())
            .ok_or_else(|| DbError::IndexUnavailable {
                table: self.name.clone(),
                attribute: attribute.to_string(),
            })?;
        index.create_index_from(attribute, column, unique, &self.tuples);
        debug!(table = %self.name, attribute, unique, rows = self.tuples.len(), "create secondary index");
        Ok(())
    }

    /// Removes a secondary index, returning whether it existed.
    pub fn drop_index(&mut self, attribute: &str) -> Result<bool> {
        Ok(self.linear_hash_mut(attribute)?.drop_index(attribute))
    }

    /// Tuples whose `attribute` equals `value`, through a secondary index.
    /// `None` when the attribute has no secondary index.
    pub fn lookup_by(&self, attribute: &str, value: &Value) -> Option<&[Tuple]> {
        let index = self.index.as_ref()?.as_linear_hash()?;
        if !index.has_index(attribute) {
            return None;
        }
        Some(index.lookup(attribute, value).unwrap_or(&[]))
    }

    pub fn has_secondary_index(&self, attribute: &str) -> bool {
        self.index
            .as_ref()
            .and_then(|i| i.as_linear_hash())
            .is_some_and(|i| i.has_index(attribute))
    }

    fn linear_hash_mut(
        &mut self,
        attribute: &str,
    ) -> Result<&mut crate::lin_hash::LinearHashIndex<CompositeKey, Tuple>> {
        let table = &self.name;
        self.index
            .as_mut()
            .and_then(|i| i.as_linear_hash_mut())
            .ok_or_else(|| DbError::IndexUnavailable {
                table: table.clone(),
                attribute: attribute.to_string(),
            })
    }

    /// Heap bytes held by a linear hash primary index and its secondary indexes.
    pub fn index_allocated_bytes(&self) -> Option<usize> {
        self.index
            .as_ref()
            .and_then(|i| i.as_linear_hash())
            .map(|i| i.allocated_bytes())
    }

    /// Primary index contents in key order; empty when unindexed.
    pub fn index_entries(&self) -> Vec<(&CompositeKey, &Tuple)> {
        let mut entries: Vec<_> = self
            .index
            .as_ref()
            .map(|i| i.entries().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("strategy", &self.strategy)
            .field("rows", &self.tuples.len())
            .finish()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = format!("|-{}-|", "-".repeat(15 * self.schema.arity()));
        writeln!(f, "\n Table {}", self.name)?;
        writeln!(f, "{rule}")?;
        write!(f, "| ")?;
        for name in self.schema.attributes() {
            write!(f, "{name:>15}")?;
        }
        writeln!(f, " |")?;
        writeln!(f, "{rule}")?;
        for tuple in &self.tuples {
            write!(f, "| ")?;
            for value in tuple.iter() {
                write!(f, "{:>15}", value.to_string())?;
            }
            writeln!(f, " |")?;
        }
        writeln!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        Schema::new(
            vec![
                ColumnDef::new("id", DataType::Int),
                ColumnDef::new("name", DataType::Text),
            ],
            vec!["id".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_table_creation() {
        let table = Table::new("users", users_schema());
        assert_eq!(table.schema().arity(), 2);
        assert_eq!(table.len(), 0);
        assert_eq!(table.strategy(), IndexStrategy::LinearHash);
    }

    #[test]
    fn test_table_insert_and_get() {
        let mut table = Table::new("test", users_schema());

        assert_eq!(table.insert(vec![Value::Int(1), Value::from("Ann")]).unwrap(), 0);
        assert_eq!(table.insert(vec![Value::Int(2), Value::from("Ben")]).unwrap(), 1);

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get_row(1).unwrap().as_ref(),
            &[Value::Int(2), Value::from("Ben")]
        );
        assert!(table.get_row(2).is_none());
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut table = Table::new("test", users_schema());

        // too many values
        let result = table.insert(vec![Value::Int(1), Value::from("a"), Value::Int(2)]);
        assert!(matches!(
            result,
            Err(DbError::TupleArity {
                expected: 2,
                actual: 3,
                ..
            })
        ));

        // not enough
        assert!(table.insert(Vec::<Value>::new()).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_type_mismatch_error() {
        let mut table = Table::new("test", users_schema());
        let result = table.insert(vec![Value::from("one"), Value::from("Ann")]);
        assert!(matches!(result, Err(DbError::DomainViolation { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_col() {
        let table = Table::new("users", users_schema());
        assert_eq!(table.col("id"), Some(0));
        assert_eq!(table.col("name"), Some(1));
        assert_eq!(table.col("age"), None);
    }

    #[test]
    fn test_schema_validation() {
        let dup = Schema::new(
            vec![
                ColumnDef::new("a", DataType::Int),
                ColumnDef::new("a", DataType::Int),
            ],
            vec![],
        );
        assert!(matches!(dup, Err(DbError::InvalidSchema(_))));

        let bad_key = Schema::parse("a b", "Integer String", "c");
        assert!(matches!(bad_key, Err(DbError::AttributeNotFound { .. })));

        let arity = Schema::parse("a b", "Integer", "a");
        assert!(matches!(arity, Err(DbError::InvalidSchema(_))));

        let whole_row = Schema::parse("a b", "Integer String", "").unwrap();
        assert_eq!(whole_row.key(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_compatible() {
        let a = Schema::parse("x y", "Integer String", "x").unwrap();
        let b = Schema::parse("p q", "Long Text", "p").unwrap();
        let c = Schema::parse("p q", "Integer Integer", "p").unwrap();
        let d = Schema::parse("p", "Integer", "p").unwrap();

        assert!(a.compatible(&b).is_ok());
        assert!(matches!(
            a.compatible(&c),
            Err(DbError::SchemaDomain { position: 1, .. })
        ));
        assert!(matches!(
            a.compatible(&d),
            Err(DbError::SchemaArity { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_lookup_with_every_strategy() {
        for strategy in [
            IndexStrategy::NoIndex,
            IndexStrategy::TreeMap,
            IndexStrategy::HashMap,
            IndexStrategy::LinearHash,
        ] {
            let rows = (0..50).map(|i| vec![Value::Int(i), Value::from(format!("u{i}"))]);
            let table = Table::with_tuples("users", users_schema(), rows, strategy).unwrap();

            let hit = table.lookup(&CompositeKey::single(42i64)).unwrap();
            assert_eq!(hit[1], Value::from("u42"), "{strategy:?}");
            assert!(table.lookup(&CompositeKey::single(50i64)).is_none());
            assert_eq!(table.index_entries().len(), if strategy.is_indexed() { 50 } else { 0 });
        }
    }

    #[test]
    fn test_secondary_index() {
        let schema = Schema::parse("sid cid", "Integer Integer", "sid cid").unwrap();
        let mut takes = Table::new("Takes", schema);
        takes.insert(vec![Value::Int(1), Value::Int(101)]).unwrap();
        takes.create_index("sid").unwrap();
        takes.insert(vec![Value::Int(1), Value::Int(102)]).unwrap();
        takes.insert(vec![Value::Int(2), Value::Int(101)]).unwrap();

        assert!(takes.has_secondary_index("sid"));
        assert_eq!(takes.lookup_by("sid", &Value::Int(1)).unwrap().len(), 2);
        assert_eq!(takes.lookup_by("sid", &Value::Int(9)).unwrap().len(), 0);
        assert!(takes.lookup_by("cid", &Value::Int(101)).is_none());

        assert!(matches!(
            takes.create_index("grade"),
            Err(DbError::AttributeNotFound { .. })
        ));
        let with_secondary = takes.index_allocated_bytes().unwrap();
        assert!(takes.drop_index("sid").unwrap());
        assert!(takes.index_allocated_bytes().unwrap() < with_secondary);
        assert!(!takes.has_secondary_index("sid"));
    }

    #[test]
    fn test_secondary_index_requires_linear_hash() {
        let mut table =
            Table::with_strategy("t", users_schema(), IndexStrategy::TreeMap, IndexConfig::default());
        assert!(matches!(
            table.create_index("name"),
            Err(DbError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_display() {
        let mut table = Table::new("users", users_schema());
        table.insert(vec![Value::Int(7), Value::from("Alice")]).unwrap();
        let out = table.to_string();
        assert!(out.contains("Table users"));
        assert!(out.contains(&format!("{:>15}", "Alice")));
        assert_eq!(out.lines().filter(|l| l.starts_with("|-")).count(), 3);
    }
}
