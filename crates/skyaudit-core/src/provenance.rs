// SPDX-License-Identifier: Apache-2.0

//! Provenance trace of cache lookups.
//!
//! Mirrors every lookup a check performed, keyed by the lookup path, so a
//! caller can audit exactly which data underpinned a result.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::cache::CacheEntry;

/// Record of every cache lookup made during one check run.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTrace {
    entries: BTreeMap<Vec<String>, Arc<CacheEntry>>,
}

impl ProvenanceTrace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the entry retrieved for `path`, replacing any earlier record.
    pub fn record<S: AsRef<str>>(&mut self, path: &[S], entry: Arc<CacheEntry>) {
        let key = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.entries.insert(key, entry);
    }

    /// Entry recorded for `path`, if it was looked up.
    #[must_use]
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&CacheEntry> {
        let key: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.entries.get(&key).map(AsRef::as_ref)
    }

    /// Number of distinct paths looked up.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing was looked up.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded lookups in key-path order.
    pub fn iter(&self) -> impl Iterator<Item = (&[String], &CacheEntry)> {
        self.entries
            .iter()
            .map(|(path, entry)| (path.as_slice(), entry.as_ref()))
    }

    /// Nested JSON mirroring the cache layout.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        'paths: for (path, entry) in &self.entries {
            let Some((last, parents)) = path.split_last() else {
                continue;
            };
            let mut node = &mut root;
            for key in parents {
                let child = node
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                // A shorter path recorded as absent gives way to deeper records.
                if !child.is_object() {
                    *child = Value::Object(Map::new());
                }
                let Some(next) = child.as_object_mut() else {
                    continue 'paths;
                };
                node = next;
            }
            let leaf = serde_json::to_value(entry.as_ref()).unwrap_or(Value::Null);
            match node.get(last) {
                Some(Value::Object(existing)) if !leaf.is_object() && !existing.is_empty() => {}
                _ => {
                    node.insert(last.clone(), leaf);
                }
            }
        }
        Value::Object(root)
    }
}

impl Serialize for ProvenanceTrace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_overwrites() {
        let mut trace = ProvenanceTrace::new();
        trace.record(&["iam", "listUsers", "us-east-1"], Arc::new(CacheEntry::Absent));
        trace.record(
            &["iam", "listUsers", "us-east-1"],
            Arc::new(CacheEntry::present(vec![])),
        );

        assert_eq!(trace.len(), 1);
        assert_eq!(
            trace.get(&["iam", "listUsers", "us-east-1"]),
            Some(&CacheEntry::Present(vec![]))
        );
    }

    #[test]
    fn test_to_value_nests_paths() {
        let mut trace = ProvenanceTrace::new();
        trace.record(
            &["elbv2", "describeLoadBalancers", "us-east-1"],
            Arc::new(CacheEntry::present(vec![json!({ "DNSName": "lb" })])),
        );
        trace.record(
            &["elbv2", "describeListeners", "us-east-1", "lb"],
            Arc::new(CacheEntry::errored("denied")),
        );
        trace.record(
            &["elbv2", "describeLoadBalancers", "eu-west-1"],
            Arc::new(CacheEntry::Absent),
        );

        assert_eq!(
            trace.to_value(),
            json!({
                "elbv2": {
                    "describeLoadBalancers": {
                        "us-east-1": { "data": [ { "DNSName": "lb" } ] },
                        "eu-west-1": null
                    },
                    "describeListeners": {
                        "us-east-1": { "lb": { "err": { "message": "denied" } } }
                    }
                }
            })
        );
    }

    #[test]
    fn test_absent_prefix_yields_to_deeper_record() {
        let mut trace = ProvenanceTrace::new();
        trace.record(&["a", "b"], Arc::new(CacheEntry::Absent));
        trace.record(&["a", "b", "c"], Arc::new(CacheEntry::present(vec![])));

        assert_eq!(trace.to_value(), json!({ "a": { "b": { "c": { "data": [] } } } }));
    }

    #[test]
    fn test_iter_in_path_order() {
        let mut trace = ProvenanceTrace::new();
        trace.record(&["b"], Arc::new(CacheEntry::Absent));
        trace.record(&["a"], Arc::new(CacheEntry::Absent));

        let paths: Vec<_> = trace.iter().map(|(p, _)| p.join(".")).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }
}
