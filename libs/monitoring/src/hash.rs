//! Content hash for rendered configuration.

use std::collections::BTreeSet;

use fleet_id::InstanceId;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hash of a JSON document, independent of key order and whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigHash(String);

impl ConfigHash {
    /// Compute a hash from canonical JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let canonical = canonical_json(json);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let result = hasher.finalize();
        Self(format!("sha256:{}", hex::encode(result)))
    }

    /// Hash of `config` as applied to `nodes`.
    ///
    /// Node order and duplicates do not matter, but adding or removing a
    /// node changes the hash.
    pub fn applied(config: &Value, nodes: &[InstanceId]) -> Self {
        let nodes: BTreeSet<&str> = nodes.iter().map(InstanceId::as_str).collect();
        let mut applied = Map::new();
        applied.insert("config".to_string(), config.clone());
        applied.insert("nodes".to_string(), nodes.into_iter().collect());
        Self::from_json(&Value::Object(applied))
    }

    /// Wrap a hash previously read back from the provider.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produce canonical JSON (sorted keys, no extra whitespace).
pub fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}:{}", quote(k), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        serde_json::Value::String(s) => quote(s),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

fn quote(s: &str) -> String {
    // Serializing a str cannot fail.
    serde_json::to_string(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_hash_ignores_key_order() {
        let a = json!({"agent": {"interval": 60, "run_as_user": "root"}, "metrics": {}});
        let b = json!({"metrics": {}, "agent": {"run_as_user": "root", "interval": 60}});
        assert_eq!(ConfigHash::from_json(&a), ConfigHash::from_json(&b));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = json!({"agent": {"interval": 60}});
        let b = json!({"agent": {"interval": 30}});
        assert_ne!(ConfigHash::from_json(&a), ConfigHash::from_json(&b));
    }

    fn nodes(ids: &[&str]) -> Vec<InstanceId> {
        ids.iter().map(|id| InstanceId::parse(id).unwrap()).collect()
    }

    #[test]
    fn test_applied_hash_ignores_node_order() {
        let config = json!({"agent": {"interval": 60}});
        assert_eq!(
            ConfigHash::applied(&config, &nodes(&["i-1", "i-2"])),
            ConfigHash::applied(&config, &nodes(&["i-2", "i-1", "i-2"]))
        );
    }

    #[test]
    fn test_applied_hash_changes_when_node_joins() {
        let config = json!({"agent": {"interval": 60}});
        assert_ne!(
            ConfigHash::applied(&config, &nodes(&["i-1"])),
            ConfigHash::applied(&config, &nodes(&["i-1", "i-2"]))
        );
        assert_ne!(
            ConfigHash::applied(&config, &nodes(&["i-1"])),
            ConfigHash::from_json(&config)
        );
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let value = json!({"b": "quote \" and\nnewline", "a": [1, null, true]});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":[1,null,true],"b":"quote \" and\nnewline"}"#
        );
    }

    #[test]
    fn test_stored_hash_round_trips() {
        let hash = ConfigHash::from_json(&json!({"x": 1}));
        assert!(hash.as_str().starts_with("sha256:"));
        assert_eq!(ConfigHash::from_stored(hash.to_string()), hash);
    }
}
