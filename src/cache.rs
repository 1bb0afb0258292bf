// src/cache.rs

//! Per-node result caching.
//!
//! The executor asks the cache before invoking a node. A hit skips the call
//! and reuses the stored outputs.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::node::{Inputs, NodeReturn};
use crate::types::CacheMode;

pub trait ResultCache: Send {
    fn name(&self) -> &'static str;

    fn get(&self, node_id: &str, inputs: &Inputs) -> Option<NodeReturn>;

    fn put(&mut self, node_id: &str, inputs: &Inputs, result: &NodeReturn);

    fn clear(&mut self);
}

/// Never stores anything; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ResultCache for NoopCache {
    fn name(&self) -> &'static str {
        "none"
    }

    fn get(&self, _node_id: &str, _inputs: &Inputs) -> Option<NodeReturn> {
        None
    }

    fn put(&mut self, _node_id: &str, _inputs: &Inputs, _result: &NodeReturn) {}

    fn clear(&mut self) {}
}

/// Keeps the last result of each node, keyed by a hash of its inputs.
///
/// A node's entry is replaced whenever it runs with different inputs.
#[derive(Debug, Default)]
pub struct ContentAddressedCache {
    entries: HashMap<String, (blake3::Hash, NodeReturn)>,
}

impl ContentAddressedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultCache for ContentAddressedCache {
    fn name(&self) -> &'static str {
        "content"
    }

    fn get(&self, node_id: &str, inputs: &Inputs) -> Option<NodeReturn> {
        let (stored, result) = self.entries.get(node_id)?;
        if *stored == hash_inputs(inputs) {
            trace!(node = %node_id, "result cache hit");
            Some(result.clone())
        } else {
            None
        }
    }

    fn put(&mut self, node_id: &str, inputs: &Inputs, result: &NodeReturn) {
        self.entries
            .insert(node_id.to_string(), (hash_inputs(inputs), result.clone()));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// blake3 digest of the inputs serialized as canonical JSON.
pub fn hash_inputs(inputs: &Inputs) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    write_canonical(&mut hasher, &Value::Object(inputs.clone()));
    hasher.finalize()
}

/// Object keys are emitted sorted so equal maps hash equally regardless of
/// insertion order.
fn write_canonical(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                if let Some(v) = map.get(key) {
                    write_canonical(hasher, v);
                }
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(hasher, item);
            }
            hasher.update(b"]");
        }
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}

pub fn cache_for_mode(mode: CacheMode) -> Box<dyn ResultCache> {
    match mode {
        CacheMode::None => Box::new(NoopCache),
        CacheMode::Content => Box::new(ContentAddressedCache::new()),
    }
}
