//! Graph and calibration key vectors.
//!
//! A key vector is an ordered list of key-value pairs. The backend uses the
//! graph key vector (GKV) to select which compiled topology to open and the
//! calibration key vector (CKV) to select which calibration data set applies.
//! The engine treats both as opaque: it forwards them to the backend and
//! never reorders or mutates them.

use serde::{Deserialize, Serialize};

/// One key-value pair in a key vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Backend-defined key identifier.
    pub key: u32,
    /// Value selected for the key.
    pub value: u32,
}

impl KeyValue {
    /// Create a key-value pair.
    pub const fn new(key: u32, value: u32) -> Self {
        Self { key, value }
    }
}

/// Ordered key-value set, forwarded to the backend as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVector {
    pairs: Vec<KeyValue>,
}

impl KeyVector {
    /// Create an empty key vector.
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Number of key-value pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the vector holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The pairs in insertion order.
    pub fn pairs(&self) -> &[KeyValue] {
        &self.pairs
    }
}

impl From<Vec<KeyValue>> for KeyVector {
    fn from(pairs: Vec<KeyValue>) -> Self {
        Self { pairs }
    }
}

impl From<&[(u32, u32)]> for KeyVector {
    fn from(pairs: &[(u32, u32)]) -> Self {
        Self {
            pairs: pairs.iter().map(|&(k, v)| KeyValue::new(k, v)).collect(),
        }
    }
}

impl FromIterator<KeyValue> for KeyVector {
    fn from_iter<I: IntoIterator<Item = KeyValue>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// Metadata supplied on every topology-affecting operation.
///
/// Bundles the graph key vector with the calibration key vector. Callers own
/// construction; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    /// Graph key vector -- selects the compiled topology.
    pub graph: KeyVector,
    /// Calibration key vector -- selects the calibration data set.
    pub calibration: KeyVector,
}

impl MetaData {
    /// Create metadata from graph and calibration key vectors.
    pub fn new(graph: KeyVector, calibration: KeyVector) -> Self {
        Self { graph, calibration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_vector_preserves_order() {
        let kv = KeyVector::from(&[(3, 30), (1, 10), (2, 20)][..]);
        let keys: Vec<u32> = kv.pairs().iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }

    #[test]
    fn empty_key_vector() {
        let kv = KeyVector::new();
        assert!(kv.is_empty());
        assert_eq!(kv.len(), 0);
    }

    #[test]
    fn metadata_from_toml() {
        let meta: MetaData = toml::from_str(
            r#"
            graph = { pairs = [{ key = 1, value = 100 }, { key = 2, value = 200 }] }
            calibration = { pairs = [{ key = 9, value = 1 }] }
            "#,
        )
        .unwrap();
        assert_eq!(meta.graph.len(), 2);
        assert_eq!(meta.calibration.pairs()[0].key, 9);
    }
}
