//! Layered YAML configuration.
//!
//! Documents are merged in order (later overrides earlier, objects merge
//! key by key, everything else is replaced), converted to JSON, and hashed
//! over a canonical rendering so the same effective config always yields
//! the same hash regardless of key order in the source files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

mod unused;

pub use unused::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Deserialize the whole effective config into `T`.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config_json.clone()).context("config does not match schema")
    }

    /// Deserialize the subtree at `pointer` into `T`; an absent subtree
    /// deserializes from an empty object so `#[serde(default)]` applies.
    pub fn section<T: DeserializeOwned>(&self, pointer: &str) -> Result<T> {
        let v = self
            .config_json
            .pointer(pointer)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(v).with_context(|| format!("invalid config section {pointer}"))
    }
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("read config {}", p.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (i, raw) in docs.iter().enumerate() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let layer = match serde_json::to_value(yaml).context("yaml -> json conversion failed")? {
            // An empty document is an empty layer.
            Value::Null => Value::Object(Map::new()),
            v => v,
        };
        merged = deep_merge(merged, layer);
    }

    let canonical_json = canonical_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(base: Value, over: Value) -> Value {
    match (base, over) {
        (Value::Object(mut b), Value::Object(o)) => {
            for (k, ov) in o {
                let merged = match b.remove(&k) {
                    Some(bv) => deep_merge(bv, ov),
                    None => ov,
                };
                b.insert(k, merged);
            }
            Value::Object(b)
        }
        (_, o) => o,
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sorted(v)).context("canonical json serialize failed")
}

fn sorted(v: &Value) -> Value {
    match v {
        Value::Object(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted(&m[k]));
            }
            Value::Object(out)
        }
        Value::Array(a) => Value::Array(a.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_scalars_and_arrays_but_merges_objects() {
        let base = json!({"a": {"x": 1, "y": [1, 2]}, "b": 1});
        let over = json!({"a": {"y": [3]}, "c": true});
        assert_eq!(
            deep_merge(base, over),
            json!({"a": {"x": 1, "y": [3]}, "b": 1, "c": true})
        );
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let v = json!({"b": {"z": 1, "a": 2}, "a": [{"d": 1, "c": 2}]});
        assert_eq!(
            canonical_json(&v).unwrap(),
            r#"{"a":[{"c":2,"d":1}],"b":{"a":2,"z":1}}"#
        );
    }
}
