use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A single result as delivered by a search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Canonical URI of the result
    pub uri: String,

    /// Category the backend filed this result under
    pub category_id: String,

    /// Result fields (title, art, attributes, ...)
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl ResultRecord {
    /// Create a record with an empty payload
    pub fn new(uri: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            category_id: category_id.into(),
            payload: Map::new(),
        }
    }

    /// Set a payload field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Names of the fields whose values differ between `self` and `other`.
    ///
    /// `uri` is reported when the URIs differ; payload fields are reported in
    /// key order, including fields present on only one side.
    pub fn changed_fields(&self, other: &ResultRecord) -> Vec<String> {
        let mut fields = Vec::new();
        if self.uri != other.uri {
            fields.push("uri".to_string());
        }
        for (name, value) in &self.payload {
            if other.payload.get(name) != Some(value) {
                fields.push(name.clone());
            }
        }
        for name in other.payload.keys() {
            if !self.payload.contains_key(name) {
                fields.push(name.clone());
            }
        }
        fields.sort();
        fields
    }
}

/// Stable dedup key of a result: BLAKE3 over the URI and the canonical payload.
///
/// Two records with the same URI but different content get different keys, so
/// a changed result is treated as an update rather than a duplicate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityKey([u8; 32]);

impl IdentityKey {
    pub fn derive(uri: &str, payload: &Map<String, Value>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(uri.as_bytes());
        hasher.update(&[0]);
        // Map keys are kept sorted, so the serialization is canonical.
        if let Err(err) = serde_json::to_writer(&mut hasher, payload) {
            warn!("failed to fingerprint payload of {uri}: {err}");
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn for_record(record: &ResultRecord) -> Self {
        Self::derive(&record.uri, &record.payload)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({self})")
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A record paired with its identity key, computed once on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedResult {
    key: IdentityKey,
    record: Arc<ResultRecord>,
}

impl KeyedResult {
    pub fn new(record: ResultRecord) -> Self {
        Self {
            key: IdentityKey::for_record(&record),
            record: Arc::new(record),
        }
    }

    pub fn key(&self) -> IdentityKey {
        self.key
    }

    pub fn record(&self) -> &ResultRecord {
        &self.record
    }

    pub fn uri(&self) -> &str {
        &self.record.uri
    }

    pub fn category_id(&self) -> &str {
        &self.record.category_id
    }
}

impl From<ResultRecord> for KeyedResult {
    fn from(record: ResultRecord) -> Self {
        Self::new(record)
    }
}
