//! Table snapshots on disk.
//!
//! A snapshot holds the table name, schema and tuples encoded with bincode.
//! Indexes are not stored; they are rebuilt when the table is loaded.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{IndexConfig, StoreConfig};
use crate::error::Result;
use crate::index::IndexStrategy;
use crate::table::{ColumnDef, Schema, Table, Tuple};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    name: &'a str,
    columns: &'a [ColumnDef],
    key: &'a [String],
    tuples: &'a [Tuple],
}

#[derive(Deserialize)]
struct Snapshot {
    name: String,
    columns: Vec<ColumnDef>,
    key: Vec<String>,
    tuples: Vec<Tuple>,
}

impl Table {
    /// Writes this table to `<dir>/<name>.<extension>`, creating the directory
    /// if needed, and returns the file path.
    pub fn save(&self, store: &StoreConfig) -> Result<PathBuf> {
        fs::create_dir_all(store.dir())?;
        let path = store.table_path(self.name());
        let mut writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(
            &mut writer,
            &SnapshotRef {
                name: self.name(),
                columns: self.schema().columns(),
                key: self.schema().key(),
                tuples: self.tuples(),
            },
        )?;
        writer.flush()?;
        debug!(table = %self.name(), path = %path.display(), rows = self.len(), "saved table");
        Ok(path)
    }

    /// Reads the snapshot of table `name` and rebuilds it with `strategy`.
    ///
    /// # Errors
    /// [Io](crate::DbError::Io) when the file cannot be read,
    /// [Encoding](crate::DbError::Encoding) when it is not a valid snapshot, and the
    /// schema or insert errors when its contents are inconsistent.
    pub fn load(name: &str, store: &StoreConfig, strategy: IndexStrategy) -> Result<Table> {
        Self::load_with_config(name, store, strategy, IndexConfig::default())
    }

    /// [Table::load] with an explicit index configuration for the rebuilt index.
    pub fn load_with_config(
        name: &str,
        store: &StoreConfig,
        strategy: IndexStrategy,
        config: IndexConfig,
    ) -> Result<Table> {
        let path = store.table_path(name);
        let reader = BufReader::new(File::open(&path)?);
        let snapshot: Snapshot = bincode::deserialize_from(reader)?;

        let schema = Schema::new(snapshot.columns, snapshot.key)?;
        let table =
            Table::with_tuples_config(snapshot.name, schema, snapshot.tuples, strategy, config)?;
        debug!(table = %table.name(), path = %path.display(), rows = table.len(), "loaded table");
        Ok(table)
    }
}
