// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Persistent state store abstraction.
//!
//! The production deployment keeps these hashes in a key/value database;
//! the engine only depends on this trait. `MemStore` backs every test.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use syncd_sai::{ObjectId, ObjectType};

/// Active applied view, one hash per object.
pub const ASIC_STATE_TABLE: &str = "ASIC_STATE";
/// Prefix of the in-progress temporary view table.
pub const TEMP_PREFIX: &str = "TEMP_";
/// Virtual-to-real id map.
pub const VIDTORID: &str = "VIDTORID";
/// Real-to-virtual id map.
pub const RIDTOVID: &str = "RIDTOVID";
/// Switch-internal default rids, keyed by canonical attribute name.
pub const HIDDEN: &str = "HIDDEN";
/// Hardware lane to port id map.
pub const LANES: &str = "LANES";
/// Monotonic source for virtual id sequence numbers.
pub const VID_COUNTER: &str = "VIDCOUNTER";

/// Hash-oriented persistent store.
///
/// Implementations must return `hgetall` fields and `keys` results in a
/// stable sorted order; the comparison logic's determinism depends on it.
pub trait StateStore: Send + Sync {
    fn hset(&self, key: &str, field: &str, value: &str);
    fn hget(&self, key: &str, field: &str) -> Option<String>;
    fn hgetall(&self, key: &str) -> Vec<(String, String)>;
    fn del(&self, key: &str);
    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Vec<String>;
    /// Atomically increment and return the counter stored at `key`.
    fn incr(&self, key: &str) -> u64;
}

/// Key of one object's hash inside a view table.
pub fn object_key(table: &str, object_type: ObjectType, serialized_id: &str) -> String {
    format!("{table}:{object_type}:{serialized_id}")
}

/// Split `TYPE:serialized_id` out of a full view-table key.
pub fn split_object_key(table: &str, key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(table)?.strip_prefix(':')?;
    let (object_type, id) = rest.split_once(':')?;
    Some((object_type.to_string(), id.to_string()))
}

/// Erase every row of a view table.
pub fn clear_table(store: &dyn StateStore, table: &str) {
    for key in store.keys(&format!("{table}:")) {
        store.del(&key);
    }
}

/// Read one of the id-map hashes into memory.
pub fn read_object_map(store: &dyn StateStore, table: &str) -> BTreeMap<ObjectId, ObjectId> {
    store
        .hgetall(table)
        .into_iter()
        .filter_map(|(k, v)| Some((k.parse().ok()?, v.parse().ok()?)))
        .collect()
}

/// In-memory store, used by tests and as the reference implementation.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemStoreInner>,
}

#[derive(Default)]
struct MemStoreInner {
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    counters: BTreeMap<String, u64>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemStore {
    fn hset(&self, key: &str, field: &str, value: &str) {
        self.inner
            .lock()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    fn hget(&self, key: &str, field: &str) -> Option<String> {
        self.inner.lock().hashes.get(key)?.get(field).cloned()
    }

    fn hgetall(&self, key: &str) -> Vec<(String, String)> {
        self.inner
            .lock()
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn del(&self, key: &str) {
        self.inner.lock().hashes.remove(key);
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        self.inner
            .lock()
            .hashes
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn incr(&self, key: &str) -> u64 {
        let mut inner = self.inner.lock();
        let counter = inner.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}
