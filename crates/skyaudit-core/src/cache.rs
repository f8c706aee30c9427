// SPDX-License-Identifier: Apache-2.0

//! Structured response cache for collected cloud API results.
//!
//! The cache is a tree keyed by `service → operation → region → [resource…]`.
//! Every leaf holds one [`CacheEntry`]: the API call was never collected
//! (`Absent`), failed (`Errored`), or succeeded (`Present`). Collectors build
//! the cache once per scan; checks only ever read it.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "elbv2": {
//!     "describeLoadBalancers": {
//!       "us-east-1": { "data": [ { "DNSName": "lb.example" } ] },
//!       "eu-west-1": { "err": { "message": "AccessDenied" } },
//!       "us-west-2": null
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ScanError;
use crate::provenance::ProvenanceTrace;

/// Fallback text for errors that carry no message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Error recorded by a collector for a failed API call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    /// Provider error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Provider error code (e.g., `AccessDenied`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl QueryError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code: None,
        }
    }
}

/// Converts a stored error into a single display string.
///
/// Returns the error's message, or [`UNKNOWN_ERROR`] when it has none.
#[must_use]
pub fn format_error(err: &QueryError) -> String {
    match err.message.as_deref() {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => UNKNOWN_ERROR.to_string(),
    }
}

/// Outcome of one collected API call.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Never collected. Checks skip it silently.
    Absent,
    /// The collector's call failed.
    Errored(QueryError),
    /// The call succeeded. The record list may be empty.
    Present(Vec<Value>),
}

impl CacheEntry {
    /// Successful entry holding `data`.
    #[must_use]
    pub fn present(data: Vec<Value>) -> Self {
        CacheEntry::Present(data)
    }

    /// Failed entry with a message.
    pub fn errored(message: impl Into<String>) -> Self {
        CacheEntry::Errored(QueryError::new(message))
    }

    /// `true` if the entry was never collected.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, CacheEntry::Absent)
    }

    /// Records of a `Present` entry.
    #[must_use]
    pub fn data(&self) -> Option<&[Value]> {
        match self {
            CacheEntry::Present(data) => Some(data),
            _ => None,
        }
    }

    /// Display string for an `Errored` entry.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            CacheEntry::Errored(err) => Some(format_error(err)),
            _ => None,
        }
    }

    fn from_leaf(obj: &Map<String, Value>) -> Self {
        if let Some(err) = obj.get("err").filter(|e| !e.is_null()) {
            return CacheEntry::Errored(match err {
                Value::String(message) => QueryError::new(message.clone()),
                Value::Object(fields) => QueryError {
                    message: fields
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    code: fields.get("code").and_then(Value::as_str).map(str::to_string),
                },
                _ => QueryError::default(),
            });
        }

        match obj.get("data") {
            Some(Value::Array(items)) => CacheEntry::Present(items.clone()),
            // Recorded outcome without data is a failed call with no message.
            None | Some(Value::Null) => CacheEntry::Errored(QueryError::default()),
            Some(record) => CacheEntry::Present(vec![record.clone()]),
        }
    }
}

impl Serialize for CacheEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CacheEntry::Absent => serializer.serialize_none(),
            CacheEntry::Errored(err) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("err", err)?;
                map.end()
            }
            CacheEntry::Present(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("data", data)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Branch(BTreeMap<String, Node>),
    Leaf(Arc<CacheEntry>),
}

impl Node {
    fn from_value(path: &mut Vec<String>, value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Null => Ok(Node::Leaf(Arc::new(CacheEntry::Absent))),
            Value::Object(obj) if obj.contains_key("data") || obj.contains_key("err") => {
                Ok(Node::Leaf(Arc::new(CacheEntry::from_leaf(&obj))))
            }
            Value::Object(obj) => {
                let mut children = BTreeMap::new();
                for (key, child) in obj {
                    path.push(key.clone());
                    let node = Node::from_value(path, child)?;
                    path.pop();
                    children.insert(key, node);
                }
                Ok(Node::Branch(children))
            }
            other => Err(ScanError::malformed(
                path,
                format!("expected an object or null, found {}", kind_of(&other)),
            )),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Branch(children) => children.serialize(serializer),
            Node::Leaf(entry) => entry.serialize(serializer),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read-only tree of collected API responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    root: BTreeMap<String, Node>,
}

impl ResponseCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry` at `path`, creating intermediate branches.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedCache` if the path is empty, passes
    /// through an existing leaf, or ends on an existing branch.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S], entry: CacheEntry) -> Result<(), ScanError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(ScanError::malformed(path, "empty key path"));
        };

        let mut children = &mut self.root;
        for (depth, key) in parents.iter().enumerate() {
            let node = children
                .entry(key.as_ref().to_string())
                .or_insert_with(|| Node::Branch(BTreeMap::new()));
            // An explicit null may be replaced by a branch.
            if matches!(&*node, Node::Leaf(existing) if existing.is_absent()) {
                *node = Node::Branch(BTreeMap::new());
            }
            children = match node {
                Node::Branch(next) => next,
                Node::Leaf(_) => {
                    return Err(ScanError::malformed(
                        &path[..=depth],
                        "leaf where a branch was expected",
                    ));
                }
            };
        }

        if let Some(Node::Branch(_)) = children.get(last.as_ref()) {
            return Err(ScanError::malformed(path, "branch where a leaf was expected"));
        }
        children.insert(last.as_ref().to_string(), Node::Leaf(Arc::new(entry)));
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// See [`insert`](Self::insert).
    pub fn with<S: AsRef<str>>(mut self, path: &[S], entry: CacheEntry) -> Result<Self, ScanError> {
        self.insert(path, entry)?;
        Ok(self)
    }

    /// Navigates `path` and classifies what it finds.
    ///
    /// Missing keys anywhere along the path yield `Absent`.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedCache` when a leaf sits where a branch
    /// was expected or the path ends on a non-empty branch.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Result<Arc<CacheEntry>, ScanError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(ScanError::malformed(path, "empty key path"));
        };

        let mut children = &self.root;
        for (depth, key) in parents.iter().enumerate() {
            match children.get(key.as_ref()) {
                None => return Ok(Arc::new(CacheEntry::Absent)),
                Some(Node::Branch(next)) => children = next,
                // A null anywhere above the leaf means nothing below was collected.
                Some(Node::Leaf(entry)) if entry.is_absent() => return Ok(Arc::clone(entry)),
                Some(Node::Leaf(_)) => {
                    return Err(ScanError::malformed(
                        &path[..=depth],
                        "leaf where a branch was expected",
                    ));
                }
            }
        }

        match children.get(last.as_ref()) {
            None => Ok(Arc::new(CacheEntry::Absent)),
            Some(Node::Leaf(entry)) => Ok(Arc::clone(entry)),
            // `{}` is a recorded outcome with neither `data` nor `err`.
            Some(Node::Branch(next)) if next.is_empty() => {
                Ok(Arc::new(CacheEntry::Errored(QueryError::default())))
            }
            Some(Node::Branch(_)) => Err(ScanError::malformed(
                path,
                "branch where a leaf was expected",
            )),
        }
    }

    /// Number of top-level services in the cache.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.root.len()
    }

    /// Builds a cache from the collector's JSON shape.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedCache` if the root is not an object or a
    /// node is neither an object nor null.
    pub fn from_value(value: Value) -> Result<Self, ScanError> {
        let Value::Object(obj) = value else {
            return Err(ScanError::malformed::<&str>(
                &[],
                format!("cache root must be an object, found {}", kind_of(&value)),
            ));
        };

        let mut root = BTreeMap::new();
        let mut path = Vec::new();
        for (key, child) in obj {
            path.push(key.clone());
            let node = Node::from_value(&mut path, child)?;
            path.pop();
            root.insert(key, node);
        }
        Ok(Self { root })
    }

    /// Parses a cache from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Json` for invalid JSON and
    /// `ScanError::MalformedCache` for an invalid shape.
    pub fn from_json_str(json: &str) -> Result<Self, ScanError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Reads a cache written by a collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        let cache = Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            services = cache.service_count(),
            "Loaded response cache"
        );
        Ok(cache)
    }
}

impl TryFrom<Value> for ResponseCache {
    type Error = ScanError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl<'de> Deserialize<'de> for ResponseCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ResponseCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

/// Looks up `path` in `cache` and records the outcome in `provenance`.
///
/// Every classified lookup is recorded, whether absent, errored or present.
/// Repeat lookups of the same path overwrite the earlier record. A lookup
/// that faults on the cache shape has no entry to record and leaves the
/// trace unchanged; the fault ends the check run instead.
///
/// # Errors
///
/// Returns `ScanError::MalformedCache` for shape faults; see
/// [`ResponseCache::get`].
pub fn lookup<S: AsRef<str>>(
    cache: &ResponseCache,
    provenance: &mut ProvenanceTrace,
    path: &[S],
) -> Result<Arc<CacheEntry>, ScanError> {
    let entry = cache.get(path)?;
    provenance.record(path, Arc::clone(&entry));
    Ok(entry)
}
