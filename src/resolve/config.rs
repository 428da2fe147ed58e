//! Resolver configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::Result;

/// Normalized element type → classification code prefixes a matching
/// product must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationMap {
    table: BTreeMap<String, SmallVec<[String; 2]>>,
}

impl ClassificationMap {
    /// A map without entries: every type is unmapped.
    pub fn empty() -> Self {
        Self { table: BTreeMap::new() }
    }

    pub fn with_mapping(
        mut self,
        element_type: impl Into<String>,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.insert(element_type, prefixes);
        self
    }

    /// Add or replace the prefixes of one type.
    pub fn insert(&mut self, element_type: impl Into<String>, prefixes: impl IntoIterator<Item = impl Into<String>>) {
        self.table
            .insert(element_type.into(), prefixes.into_iter().map(Into::into).collect());
    }

    /// Prefixes for a normalized type. A type mapped to no prefixes counts
    /// as unmapped.
    pub fn prefixes(&self, element_type: &str) -> Option<&[String]> {
        self.table
            .get(element_type)
            .map(|p| p.as_slice())
            .filter(|p| !p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ClassificationMap {
    fn default() -> Self {
        Self::empty()
            .with_mapping("Footing", ["16."])
            .with_mapping("Wall", ["21.", "22."])
            .with_mapping("Slab", ["23."])
            .with_mapping("Stair", ["24."])
            .with_mapping("Roof", ["27."])
            .with_mapping("Beam", ["28."])
            .with_mapping("Window", ["31.2", "32.2"])
            .with_mapping("Door", ["31.3", "32.3"])
    }
}

/// Settings of a [`ResolutionPipeline`](super::ResolutionPipeline).
///
/// ```json
/// { "call_timeout_ms": 5000, "classification": { "Wall": ["21."] }, "skip_bound": true }
/// ```
///
/// Missing fields fall back to [`ResolverConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound for every single service call.
    #[serde(rename = "call_timeout_ms", with = "millis")]
    pub call_timeout: Duration,
    pub classification: ClassificationMap,
    /// Leave elements alone that already carry a binding, direct or
    /// inherited from an ancestor bound earlier in the run.
    pub skip_bound: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            classification: ClassificationMap::default(),
            skip_bound: true,
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_classification(mut self, classification: ClassificationMap) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_skip_bound(mut self, skip: bool) -> Self {
        self.skip_bound = skip;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification_table() {
        let map = ClassificationMap::default();
        assert_eq!(map.len(), 8);
        assert_eq!(map.prefixes("Wall").unwrap(), ["21.", "22."]);
        assert_eq!(map.prefixes("Door").unwrap(), ["31.3", "32.3"]);
        assert!(map.prefixes("Column").is_none());
    }

    #[test]
    fn test_type_without_prefixes_is_unmapped() {
        let map = ClassificationMap::empty().with_mapping("Wall", Vec::<String>::new());
        assert!(map.prefixes("Wall").is_none());
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config = ResolverConfig::from_json(r#"{ "call_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.call_timeout, Duration::from_millis(250));
        assert_eq!(config.classification, ClassificationMap::default());
        assert!(config.skip_bound);
    }

    #[test]
    fn test_config_replaces_classification() {
        let config =
            ResolverConfig::from_json(r#"{ "classification": { "Column": ["29."] }, "skip_bound": false }"#).unwrap();
        assert_eq!(config.classification.prefixes("Column").unwrap(), ["29."]);
        assert!(config.classification.prefixes("Wall").is_none());
        assert!(!config.skip_bound);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_serializes_timeout_as_millis() {
        let json = serde_json::to_value(ResolverConfig::default()).unwrap();
        assert_eq!(json["call_timeout_ms"], 30_000);
    }

    #[test]
    fn test_malformed_config_is_serialization_error() {
        assert!(matches!(
            ResolverConfig::from_json("{ not json"),
            Err(crate::Error::Serialization(_))
        ));
    }
}
