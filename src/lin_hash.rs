//! Linear hashing.
//!
//! A [LinearHashMap] is a growable array of bucket chains. Each bucket holds a
//! fixed number of slots and links to an overflow bucket when full. The table
//! grows one bucket at a time: whenever the load factor passes the threshold,
//! the bucket at the split pointer is redistributed between itself and a new
//! bucket appended at `mod1 + split`, so no insert ever pays for a full rehash.
//!
//! ```text
//!            split
//!              v
//! buckets: [ 0' | 1 | 2 | 3 | 4' ]      mod1 = 4, mod2 = 8
//!            ^                  ^
//!            already split      image of bucket 0
//! ```
//!
//! A key's home bucket is `hash mod mod1`, or `hash mod mod2` when that bucket has
//! already been split in the current generation. Once every bucket of the
//! generation has been split, `mod1` doubles and the split pointer wraps to 0.
//!
//! [LinearHashIndex] composes a primary map with derived secondary maps, one per
//! registered attribute, from attribute value to the entries carrying it.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Write as _};
use std::hash::{BuildHasher, Hash};
use std::iter;
use std::mem;
use std::sync::Arc;

use allocative::Allocative;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::config::IndexConfig;
use crate::value::Value;

#[derive(Debug, Clone, Allocative)]
struct Slot<K, V> {
    key: K,
    value: V,
}

/// A fixed-capacity slot array plus a link to the next bucket of its chain.
#[derive(Debug, Clone, Allocative)]
pub struct Bucket<K, V> {
    slots: Vec<Slot<K, V>>,
    next: Option<Box<Bucket<K, V>>>,
}

impl<K, V> Bucket<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            next: None,
        }
    }

    /// Number of occupied slots in this bucket (not the chain).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn next(&self) -> Option<&Bucket<K, V>> {
        self.next.as_deref()
    }

    /// Walks this bucket and its overflow buckets.
    fn chain(&self) -> impl Iterator<Item = &Bucket<K, V>> {
        iter::successors(Some(self), |b| b.next.as_deref())
    }

    fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.chain()
            .flat_map(|b| b.slots.iter().map(|slot| (&slot.key, &slot.value)))
    }

    /// Stores the entry in the first bucket of the chain with a free slot,
    /// appending an overflow bucket when the whole chain is full.
    fn push(&mut self, key: K, value: V, capacity: usize) {
        let mut bucket = self;
        loop {
            if bucket.slots.len() < capacity {
                bucket.slots.push(Slot { key, value });
                return;
            }
            bucket = bucket
                .next
                .get_or_insert_with(|| Box::new(Bucket::with_capacity(capacity)))
                .as_mut();
        }
    }

    /// Consumes the chain, returning its entries in chain order.
    fn into_entries(self) -> Vec<Slot<K, V>> {
        let mut entries = Vec::new();
        let mut current = Some(Box::new(self));
        while let Some(mut bucket) = current {
            entries.append(&mut bucket.slots);
            current = bucket.next.take();
        }
        entries
    }
}

/// A dynamic hash table using linear hashing.
///
/// In unique mode (the default) a key maps to at most one value and `put`
/// overwrites. In multi mode every `put` appends, and [LinearHashMap::get_all]
/// returns every value stored under a key.
#[derive(Clone, Allocative)]
pub struct LinearHashMap<K, V> {
    buckets: Vec<Bucket<K, V>>,
    slot_capacity: usize,
    load_threshold: f64,
    /// Bucket count of the current generation.
    mod1: usize,
    mod2: usize,
    /// Next bucket due to split, always `< mod1`.
    split: usize,
    count: usize,
    unique: bool,
}

impl<K, V> LinearHashMap<K, V> {
    /// Creates an empty unique-key map with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&IndexConfig::default())
    }

    /// Creates an empty unique-key map.
    pub fn with_config(config: &IndexConfig) -> Self {
        Self::build(config, true)
    }

    /// Creates an empty map that keeps every value put under the same key.
    pub fn multi(config: &IndexConfig) -> Self {
        Self::build(config, false)
    }

    fn build(config: &IndexConfig, unique: bool) -> Self {
        let slot_capacity = config.slot_capacity.max(1);
        let mod1 = config.initial_buckets.max(1);
        Self {
            buckets: (0..mod1).map(|_| Bucket::with_capacity(slot_capacity)).collect(),
            slot_capacity,
            load_threshold: config.load_threshold,
            mod1,
            mod2: 2 * mod1,
            split: 0,
            count: 0,
            unique,
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Number of primary buckets (chain heads), always `mod1 + split`.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn split_pointer(&self) -> usize {
        self.split
    }

    pub fn mod1(&self) -> usize {
        self.mod1
    }

    pub fn mod2(&self) -> usize {
        self.mod2
    }

    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Stored entries over total primary slot capacity.
    pub fn load_factor(&self) -> f64 {
        self.count as f64 / (self.slot_capacity * (self.mod1 + self.split)) as f64
    }

    /// Number of buckets (head plus overflow) in the chain at `bucket`.
    pub fn chain_len(&self, bucket: usize) -> Option<usize> {
        self.buckets.get(bucket).map(|b| b.chain().count())
    }

    pub fn bucket(&self, bucket: usize) -> Option<&Bucket<K, V>> {
        self.buckets.get(bucket)
    }

    /// Iterates over every entry, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets.iter().flat_map(|b| b.entries())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: Hash + Eq, V> LinearHashMap<K, V> {
    fn hash(key: &K) -> u64 {
        FxBuildHasher.hash_one(key)
    }

    /// Home bucket of a key given its hash.
    fn address(&self, hash: u64) -> usize {
        let home = (hash % self.mod1 as u64) as usize;
        if home < self.split {
            (hash % self.mod2 as u64) as usize
        } else {
            home
        }
    }

    fn home(&self, key: &K) -> &Bucket<K, V> {
        &self.buckets[self.address(Self::hash(key))]
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.home(key)
            .entries()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let i = self.address(Self::hash(key));
        let mut current = Some(&mut self.buckets[i]);
        while let Some(bucket) = current {
            if let Some(slot) = bucket.slots.iter_mut().find(|slot| slot.key == *key) {
                return Some(&mut slot.value);
            }
            current = bucket.next.as_deref_mut();
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns every value stored under `key`, in insertion order within the chain.
    pub fn get_all<'a>(&'a self, key: &'a K) -> impl Iterator<Item = &'a V> + 'a {
        self.home(key)
            .entries()
            .filter_map(move |(k, v)| (k == key).then_some(v))
    }

    /// Stores `value` under `key`.
    ///
    /// In unique mode an existing value is replaced and returned, and the entry
    /// count does not change. Otherwise the entry is appended to the key's chain,
    /// and one bucket is split if the load factor now exceeds the threshold.
    ///
    /// # Example
    /// ```
    /// # use reldb::lin_hash::LinearHashMap;
    /// let mut map = LinearHashMap::new();
    /// assert_eq!(map.put(1, "a"), None);
    /// assert_eq!(map.put(1, "b"), Some("a"));
    /// assert_eq!(map.get(&1), Some(&"b"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if self.unique {
            if let Some(slot) = self.get_mut(&key) {
                return Some(mem::replace(slot, value));
            }
        }

        let i = self.address(Self::hash(&key));
        let capacity = self.slot_capacity;
        self.buckets[i].push(key, value, capacity);
        self.count += 1;

        if self.load_factor() > self.load_threshold {
            self.split();
        }
        None
    }

    /// Redistributes the bucket at the split pointer between itself and a new
    /// bucket at `mod1 + split`, then advances the split pointer.
    fn split(&mut self) {
        let source = self.split;
        let target = self.mod1 + self.split;
        let capacity = self.slot_capacity;
        debug_assert_eq!(self.buckets.len(), target);

        let old = mem::replace(&mut self.buckets[source], Bucket::with_capacity(capacity));
        let mut stay = Bucket::with_capacity(capacity);
        let mut moved = Bucket::with_capacity(capacity);
        let mut moved_count = 0;
        for Slot { key, value } in old.into_entries() {
            if (Self::hash(&key) % self.mod2 as u64) as usize == target {
                moved.push(key, value, capacity);
                moved_count += 1;
            } else {
                stay.push(key, value, capacity);
            }
        }
        self.buckets[source] = stay;
        self.buckets.push(moved);

        self.split += 1;
        if self.split == self.mod1 {
            self.mod1 = self.mod2;
            self.mod2 *= 2;
            self.split = 0;
        }

        trace!(
            source,
            target,
            moved = moved_count,
            mod1 = self.mod1,
            split = self.split,
            "split bucket"
        );
    }
}

impl<K: Debug, V> LinearHashMap<K, V> {
    /// Renders the bucket layout, one chain per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, head) in self.buckets.iter().enumerate() {
            let _ = write!(out, "Bucket [ {i} ] =");
            for (j, bucket) in head.chain().enumerate() {
                if j > 0 {
                    out.push_str(" -->");
                }
                out.push_str(" [ ");
                for slot in &bucket.slots {
                    let _ = write!(out, "{:?} . ", slot.key);
                }
                out.push(']');
            }
            out.push('\n');
        }
        out
    }
}

impl<K: Allocative, V: Allocative> LinearHashMap<K, V> {
    /// Heap bytes owned by the map, including overflow buckets.
    pub fn allocated_bytes(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }
}

impl<K, V> Default for LinearHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V: Debug> Debug for LinearHashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Access to the attributes of an indexed entry, for secondary indexes.
pub trait Record {
    fn attribute(&self, column: usize) -> Option<&Value>;
}

impl Record for [Value] {
    fn attribute(&self, column: usize) -> Option<&Value> {
        self.get(column)
    }
}

impl Record for Vec<Value> {
    fn attribute(&self, column: usize) -> Option<&Value> {
        self.get(column)
    }
}

impl Record for Arc<[Value]> {
    fn attribute(&self, column: usize) -> Option<&Value> {
        self.get(column)
    }
}

/// A derived index from one attribute's values to the entries carrying them.
#[derive(Clone, Allocative)]
struct SecondaryIndex<V> {
    column: usize,
    unique: bool,
    entries: LinearHashMap<Value, Vec<V>>,
}

impl<V: Record + Clone> SecondaryIndex<V> {
    fn build<'a, I>(column: usize, unique: bool, config: &IndexConfig, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a V>,
        V: 'a,
    {
        let mut index = SecondaryIndex {
            column,
            unique,
            entries: LinearHashMap::with_config(config),
        };
        for value in entries {
            index.add(value);
        }
        index
    }

    fn add(&mut self, value: &V) {
        let Some(attribute) = value.attribute(self.column).cloned() else {
            return;
        };
        match self.entries.get_mut(&attribute) {
            Some(list) if self.unique => {
                list.clear();
                list.push(value.clone());
            }
            Some(list) => list.push(value.clone()),
            None => {
                self.entries.put(attribute, vec![value.clone()]);
            }
        }
    }
}

/// A [LinearHashMap] with optional secondary indexes on attributes of its values.
///
/// Secondary indexes are only maintained for attributes registered through
/// [LinearHashIndex::create_index] or [LinearHashIndex::create_unique_index].
#[derive(Clone, Allocative)]
pub struct LinearHashIndex<K, V> {
    primary: LinearHashMap<K, V>,
    secondary: BTreeMap<String, SecondaryIndex<V>>,
    config: IndexConfig,
}

impl<K, V> LinearHashIndex<K, V> {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            primary: LinearHashMap::with_config(config),
            secondary: BTreeMap::new(),
            config: *config,
        }
    }

    /// The underlying primary map.
    pub fn map(&self) -> &LinearHashMap<K, V> {
        &self.primary
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.primary.iter()
    }

    /// Removes a secondary index. Returns whether it existed.
    pub fn drop_index(&mut self, attribute: &str) -> bool {
        self.secondary.remove(attribute).is_some()
    }

    pub fn has_index(&self, attribute: &str) -> bool {
        self.secondary.contains_key(attribute)
    }

    /// Registered secondary attributes, in name order.
    pub fn indexed_attributes(&self) -> impl Iterator<Item = &str> {
        self.secondary.keys().map(String::as_str)
    }

    /// Entries whose `attribute` equals `value`, or `None` when no entry
    /// matches or the attribute is not indexed.
    pub fn lookup(&self, attribute: &str, value: &Value) -> Option<&[V]> {
        self.secondary
            .get(attribute)?
            .entries
            .get(value)
            .map(Vec::as_slice)
    }
}

impl<K: Hash + Eq, V> LinearHashIndex<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.primary.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.primary.contains_key(key)
    }
}

impl<K: Hash + Eq, V: Record + Clone> LinearHashIndex<K, V> {
    /// Stores `value` under `key` and files it in every secondary index.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        for index in self.secondary.values_mut() {
            index.add(&value);
        }
        self.primary.put(key, value)
    }

    /// Registers a secondary index on the attribute at `column` of the values,
    /// filled from the entries currently in the primary map. No-op if
    /// `attribute` is indexed.
    pub fn create_index(&mut self, attribute: &str, column: usize) {
        if !self.secondary.contains_key(attribute) {
            let index = SecondaryIndex::build(column, false, &self.config, self.primary.values());
            self.secondary.insert(attribute.to_string(), index);
        }
    }

    /// Like [LinearHashIndex::create_index], but each attribute value keeps
    /// only the most recently stored entry.
    pub fn create_unique_index(&mut self, attribute: &str, column: usize) {
        if !self.secondary.contains_key(attribute) {
            let index = SecondaryIndex::build(column, true, &self.config, self.primary.values());
            self.secondary.insert(attribute.to_string(), index);
        }
    }

    /// Registers a secondary index filled from `entries` instead of the primary
    /// map. Owners that keep values the primary map has overwritten pass their
    /// full entry list here, so the index matches one maintained by [LinearHashIndex::put]
    /// from the start. No-op if `attribute` is indexed.
    pub fn create_index_from<'a, I>(
        &mut self,
        attribute: &str,
        column: usize,
        unique: bool,
        entries: I,
    ) where
        I: IntoIterator<Item = &'a V>,
        V: 'a,
    {
        if !self.secondary.contains_key(attribute) {
            let index = SecondaryIndex::build(column, unique, &self.config, entries);
            self.secondary.insert(attribute.to_string(), index);
        }
    }
}

impl<K: Allocative, V: Allocative> LinearHashIndex<K, V> {
    /// Heap bytes owned by the primary map and all secondary indexes.
    pub fn allocated_bytes(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }
}
