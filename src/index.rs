//! Pluggable key indexes.
//!
//! A table picks its [IndexStrategy] once, at construction. Every strategy except
//! [IndexStrategy::NoIndex] is backed by a [KeyIndex] over [CompositeKey]s: the
//! standard ordered and hashed maps, or the crate's own linear hash index.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::key::CompositeKey;
use crate::lin_hash::{LinearHashIndex, LinearHashMap, Record};

/// Which map backs a table's primary index and its index-accelerated operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexStrategy {
    /// No index: lookups and de-duplication scan the tuple list.
    NoIndex,
    /// A [BTreeMap] ordered by key.
    TreeMap,
    /// A standard hash map.
    HashMap,
    /// A [LinearHashIndex], which also supports secondary indexes.
    #[default]
    LinearHash,
}

impl IndexStrategy {
    pub fn is_indexed(self) -> bool {
        self != IndexStrategy::NoIndex
    }

    /// Builds the primary index of a table. Only the linear hash strategy
    /// supports secondary indexes on top of it.
    pub fn primary<V>(self, config: &IndexConfig) -> Option<Box<dyn KeyIndex<V>>>
    where
        V: Record + Clone + 'static,
    {
        match self {
            IndexStrategy::LinearHash => Some(Box::new(LinearHashIndex::new(config))),
            other => other.transient(config),
        }
    }

    /// Builds a scratch index used inside a single operator call.
    pub fn transient<V: 'static>(self, config: &IndexConfig) -> Option<Box<dyn KeyIndex<V>>> {
        match self {
            IndexStrategy::NoIndex => None,
            IndexStrategy::TreeMap => Some(Box::new(BTreeMap::new())),
            IndexStrategy::HashMap => Some(Box::new(FxHashMap::default())),
            IndexStrategy::LinearHash => Some(Box::new(LinearHashMap::with_config(config))),
        }
    }
}

/// A unique map from [CompositeKey] to `V`.
pub trait KeyIndex<V> {
    fn get(&self, key: &CompositeKey) -> Option<&V>;

    /// Stores `value` under `key`, returning the value it replaced.
    fn put(&mut self, key: CompositeKey, value: V) -> Option<V>;

    fn len(&self) -> usize;

    fn contains_key(&self, key: &CompositeKey) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&CompositeKey, &V)> + '_>;

    /// The linear hash index behind this map, if it is one.
    fn as_linear_hash(&self) -> Option<&LinearHashIndex<CompositeKey, V>> {
        None
    }

    fn as_linear_hash_mut(&mut self) -> Option<&mut LinearHashIndex<CompositeKey, V>> {
        None
    }
}

impl<V> KeyIndex<V> for BTreeMap<CompositeKey, V> {
    fn get(&self, key: &CompositeKey) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn put(&mut self, key: CompositeKey, value: V) -> Option<V> {
        self.insert(key, value)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&CompositeKey, &V)> + '_> {
        Box::new(self.iter())
    }
}

impl<V> KeyIndex<V> for FxHashMap<CompositeKey, V> {
    fn get(&self, key: &CompositeKey) -> Option<&V> {
        std::collections::HashMap::get(self, key)
    }

    fn put(&mut self, key: CompositeKey, value: V) -> Option<V> {
        self.insert(key, value)
    }

    fn len(&self) -> usize {
        std::collections::HashMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&CompositeKey, &V)> + '_> {
        Box::new(self.iter())
    }
}

impl<V> KeyIndex<V> for LinearHashMap<CompositeKey, V> {
    fn get(&self, key: &CompositeKey) -> Option<&V> {
        LinearHashMap::get(self, key)
    }

    fn put(&mut self, key: CompositeKey, value: V) -> Option<V> {
        LinearHashMap::put(self, key, value)
    }

    fn len(&self) -> usize {
        LinearHashMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&CompositeKey, &V)> + '_> {
        Box::new(self.iter())
    }
}

impl<V: Record + Clone> KeyIndex<V> for LinearHashIndex<CompositeKey, V> {
    fn get(&self, key: &CompositeKey) -> Option<&V> {
        LinearHashIndex::get(self, key)
    }

    fn put(&mut self, key: CompositeKey, value: V) -> Option<V> {
        LinearHashIndex::put(self, key, value)
    }

    fn len(&self) -> usize {
        LinearHashIndex::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&CompositeKey, &V)> + '_> {
        Box::new(self.iter())
    }

    fn as_linear_hash(&self) -> Option<&LinearHashIndex<CompositeKey, V>> {
        Some(self)
    }

    fn as_linear_hash_mut(&mut self) -> Option<&mut LinearHashIndex<CompositeKey, V>> {
        Some(self)
    }
}
