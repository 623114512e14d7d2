use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{IndexConfig, StoreConfig};
use crate::error::{DbError, Result};
use crate::index::IndexStrategy;
use crate::table::{Schema, Table};

/// A named collection of tables sharing one index strategy and one snapshot store.
#[derive(Debug, Default)]
pub struct Database {
    /// A map of table names to their respective [Table] structures.
    tables: FxHashMap<String, Table>,
    strategy: IndexStrategy,
    index_config: IndexConfig,
    store: StoreConfig,
}

impl Database {
    /// Creates an empty catalog with the default strategy and store location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty catalog whose new and loaded tables use `strategy`.
    pub fn with_strategy(strategy: IndexStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_index_config(mut self, config: IndexConfig) -> Self {
        self.index_config = config;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn strategy(&self) -> IndexStrategy {
        self.strategy
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Creates a new, empty table.
    ///
    /// # Errors
    /// Returns [DbError::TableExists] if a table with the same name already exists.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<&mut Table> {
        if self.tables.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        let table = Table::with_strategy(name, schema, self.strategy, self.index_config);
        Ok(self.tables.entry(name.to_string()).or_insert(table))
    }

    /// Adds an existing table, such as the result of an algebra operator, under its own name.
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(table.name()) {
            return Err(DbError::TableExists(table.name().to_string()));
        }
        debug!(table = %table.name(), rows = table.len(), "add table");
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Removes a table from the catalog and returns it.
    ///
    /// # Errors
    /// Returns [DbError::TableNotFound] if the table does not exist.
    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        self.tables
            .remove(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Retrieves a reference to a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Retrieves a mutable reference to a table by name.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Writes a table's snapshot to the store.
    pub fn save_table(&self, name: &str) -> Result<PathBuf> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?
            .save(&self.store)
    }

    /// Loads a table's snapshot from the store, replacing any table of the same name.
    pub fn load_table(&mut self, name: &str) -> Result<&mut Table> {
        let table = Table::load_with_config(name, &self.store, self.strategy, self.index_config)?;
        self.tables.insert(name.to_string(), table);
        self.get_table_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn student_schema() -> Schema {
        Schema::parse("sid name", "Integer String", "sid").unwrap()
    }

    // ─────────────────────────────────────────────
    // Test 1 : create and list tables
    // ─────────────────────────────────────────────
    #[test]
    fn test_create_table() {
        let mut db = Database::new();
        db.create_table("Student", student_schema()).unwrap();
        db.create_table("Course", student_schema()).unwrap();

        assert_eq!(db.list_tables(), vec!["Course", "Student"]);
        assert_eq!(
            db.get_table("Student").unwrap().strategy(),
            IndexStrategy::LinearHash
        );
    }

    // ─────────────────────────────────────────────
    // Test 2 : duplicate names are rejected
    // ─────────────────────────────────────────────
    #[test]
    fn test_create_duplicate_table() {
        let mut db = Database::new();
        db.create_table("Student", student_schema()).unwrap();
        assert!(matches!(
            db.create_table("Student", student_schema()),
            Err(DbError::TableExists(_))
        ));
    }

    // ─────────────────────────────────────────────
    // Test 3 : drop table
    // ─────────────────────────────────────────────
    #[test]
    fn test_drop_table() {
        let mut db = Database::new();
        db.create_table("Student", student_schema()).unwrap();
        assert_eq!(db.drop_table("Student").unwrap().name(), "Student");
        assert!(db.get_table("Student").is_none());
        assert!(matches!(
            db.drop_table("Student"),
            Err(DbError::TableNotFound(_))
        ));
    }

    // ─────────────────────────────────────────────
    // Test 4 : results of operators can be registered
    // ─────────────────────────────────────────────
    #[test]
    fn test_add_result_table() {
        let mut db = Database::with_strategy(IndexStrategy::HashMap);
        let student = db.create_table("Student", student_schema()).unwrap();
        student.insert(vec![Value::Int(1), "Alice".into()]).unwrap();
        student.insert(vec![Value::Int(2), "Bob".into()]).unwrap();

        let names = db.get_table("Student").unwrap().project_str("name").unwrap();
        let result_name = names.name().to_string();
        db.add_table(names).unwrap();

        let stored = db.get_table(&result_name).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.strategy(), IndexStrategy::HashMap);
    }

    // ─────────────────────────────────────────────
    // Test 5 : the catalog's index config survives a reload
    // ─────────────────────────────────────────────
    #[test]
    fn test_load_table_uses_catalog_index_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig::default().with_slot_capacity(2).with_load_threshold(0.8);
        let mut db = Database::new()
            .with_index_config(config)
            .with_store(StoreConfig::new(dir.path()));
        db.create_table("Student", student_schema()).unwrap();
        assert_eq!(db.get_table("Student").unwrap().index_config(), &config);

        db.save_table("Student").unwrap();
        db.drop_table("Student").unwrap();
        assert_eq!(db.load_table("Student").unwrap().index_config(), &config);
    }

    // ─────────────────────────────────────────────
    // Test 6 : save and load through the catalog
    // ─────────────────────────────────────────────
    #[test]
    fn test_save_and_load_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::new().with_store(StoreConfig::new(dir.path()));
        let student = db.create_table("Student", student_schema()).unwrap();
        student.insert(vec![Value::Int(1), "Alice".into()]).unwrap();
        db.save_table("Student").unwrap();
        db.drop_table("Student").unwrap();

        let loaded = db.load_table("Student").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.index_config(), &IndexConfig::default());
        assert!(matches!(
            db.save_table("Missing"),
            Err(DbError::TableNotFound(_))
        ));
    }
}
