//! An in-memory relational table engine.
//!
//! Typed [Table]s support selection, projection, union, minus and several
//! join algorithms. Each table picks an [IndexStrategy] for its primary index;
//! the default is a [LinearHashIndex], a hash index that grows one bucket at a
//! time and can carry secondary indexes.
//!
//! ```
//! use reldb::{Schema, Table, Value};
//!
//! let schema = Schema::parse("sid name status", "Integer String String", "sid").unwrap();
//! let mut student = Table::new("Student", schema);
//! student.insert(vec![Value::Int(1), "Alice".into(), "active".into()]).unwrap();
//! student.insert(vec![Value::Int(2), "Bob".into(), "inactive".into()]).unwrap();
//!
//! let active = student.select_where("status == active").unwrap();
//! assert_eq!(active.len(), 1);
//! ```

pub mod algebra;
pub mod condition;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod index;
pub mod join;
pub mod key;
pub mod lin_hash;
pub mod storage;
pub mod table;
pub mod value;

pub use condition::{ComparisonOp, Condition, ThetaCondition};
pub use config::{IndexConfig, StoreConfig};
pub use data_type::DataType;
pub use database::Database;
pub use error::{DbError, Result};
pub use index::{IndexStrategy, KeyIndex};
pub use key::CompositeKey;
pub use lin_hash::{LinearHashIndex, LinearHashMap, Record};
pub use table::{ColumnDef, Schema, Table, Tuple};
pub use value::Value;
