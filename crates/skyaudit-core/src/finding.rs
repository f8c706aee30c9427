// SPDX-License-Identifier: Apache-2.0

//! Findings and the ordered result collector.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheEntry, format_error};

/// Pseudo-region for account-wide singleton resources.
pub const GLOBAL_REGION: &str = "global";

/// Outcome status of one finding.
///
/// The wire codes are `0..=3`. Statuses are compared only for equality;
/// there is no severity ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    /// Rule passed.
    Ok,
    /// Informational warning.
    Warn,
    /// Rule violated.
    Fail,
    /// Result could not be determined.
    Unknown,
}

impl Status {
    /// Every status, in wire-code order.
    pub const ALL: [Status; 4] = [Status::Ok, Status::Warn, Status::Fail, Status::Unknown];

    /// Numeric code used by renderers.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Warn => 1,
            Status::Fail => 2,
            Status::Unknown => 3,
        }
    }

    /// Display label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Warn),
            2 => Ok(Status::Fail),
            3 => Ok(Status::Unknown),
            other => Err(format!("invalid status code {other}")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Outcome status.
    pub status: Status,
    /// Human-readable message.
    pub message: String,
    /// Region or location, or [`GLOBAL_REGION`].
    pub region: String,
    /// Resource identifier; omitted for account or region level findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Append-only, ordered list of findings.
///
/// No deduplication or reordering happens here; a check may legitimately
/// report several findings for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Findings(Vec<Finding>);

impl Findings {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finding.
    pub fn record(
        &mut self,
        status: Status,
        message: impl Into<String>,
        region: impl Into<String>,
        resource: Option<&str>,
    ) {
        self.0.push(Finding {
            status,
            message: message.into(),
            region: region.into(),
            resource: resource.map(str::to_string),
        });
    }

    /// Appends an `Ok` finding.
    pub fn ok(&mut self, message: impl Into<String>, region: &str, resource: Option<&str>) {
        self.record(Status::Ok, message, region, resource);
    }

    /// Appends a `Warn` finding.
    pub fn warn(&mut self, message: impl Into<String>, region: &str, resource: Option<&str>) {
        self.record(Status::Warn, message, region, resource);
    }

    /// Appends a `Fail` finding.
    pub fn fail(&mut self, message: impl Into<String>, region: &str, resource: Option<&str>) {
        self.record(Status::Fail, message, region, resource);
    }

    /// Appends an `Unknown` finding.
    pub fn unknown(&mut self, message: impl Into<String>, region: &str, resource: Option<&str>) {
        self.record(Status::Unknown, message, region, resource);
    }

    /// Applies the standard listing classification to `entry`.
    ///
    /// - `Absent`: nothing recorded, returns `None`.
    /// - `Errored`: records `Unknown` "Unable to query for {kind}: {error}",
    ///   returns `None`.
    /// - `Present` and empty: records `Ok` "No {kind} found", returns `None`.
    /// - `Present` with records: returns them for the caller to descend into.
    pub fn listing<'e>(
        &mut self,
        entry: &'e CacheEntry,
        kind: &str,
        region: &str,
        resource: Option<&str>,
    ) -> Option<&'e [Value]> {
        match entry {
            CacheEntry::Absent => None,
            CacheEntry::Errored(err) => {
                self.unknown(
                    format!("Unable to query for {kind}: {}", format_error(err)),
                    region,
                    resource,
                );
                None
            }
            CacheEntry::Present(data) if data.is_empty() => {
                self.ok(format!("No {kind} found"), region, resource);
                None
            }
            CacheEntry::Present(data) => Some(data),
        }
    }

    /// Appends every finding of `other`, preserving its order.
    pub fn append(&mut self, other: Findings) {
        self.0.extend(other.0);
    }

    /// Findings in record order.
    #[must_use]
    pub fn as_slice(&self) -> &[Finding] {
        &self.0
    }

    /// Number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterator over findings in record order.
    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.0.iter()
    }

    /// Number of findings with `status`.
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.0.iter().filter(|f| f.status == status).count()
    }

    /// Consumes the collector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Finding> {
        self.0
    }
}

impl std::ops::Index<usize> for Findings {
    type Output = Finding;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl FromIterator<Findings> for Findings {
    fn from_iter<T: IntoIterator<Item = Findings>>(iter: T) -> Self {
        let mut all = Findings::new();
        for batch in iter {
            all.append(batch);
        }
        all
    }
}

impl IntoIterator for Findings {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Warn.code(), 1);
        assert_eq!(Status::Fail.code(), 2);
        assert_eq!(Status::Unknown.code(), 3);
        assert_eq!(Status::try_from(2), Ok(Status::Fail));
        assert!(Status::try_from(4).is_err());
    }

    #[test]
    fn test_finding_serialization() {
        let mut findings = Findings::new();
        findings.fail("IAM User has no Tag", GLOBAL_REGION, Some("arn:aws:iam::1:user/a"));
        findings.ok("No users found", GLOBAL_REGION, None);

        let value = serde_json::to_value(&findings).unwrap();
        assert_eq!(
            value,
            json!([
                { "status": 2, "message": "IAM User has no Tag", "region": "global",
                  "resource": "arn:aws:iam::1:user/a" },
                { "status": 0, "message": "No users found", "region": "global" }
            ])
        );

        let parsed: Findings = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, findings);
    }

    #[test]
    fn test_record_keeps_order_and_duplicates() {
        let mut findings = Findings::new();
        findings.warn("first", "us-east-1", Some("r"));
        findings.fail("second", "us-east-1", Some("r"));
        findings.warn("first", "us-east-1", Some("r"));

        let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "first"]);
        assert_eq!(findings.count(Status::Warn), 2);
    }

    #[test]
    fn test_listing_classification() {
        let mut findings = Findings::new();

        assert!(findings.listing(&CacheEntry::Absent, "users", "global", None).is_none());
        assert!(findings.is_empty());

        assert!(
            findings
                .listing(&CacheEntry::errored("denied"), "users", "global", None)
                .is_none()
        );
        assert_eq!(findings[0].status, Status::Unknown);
        assert_eq!(findings[0].message, "Unable to query for users: denied");

        assert!(
            findings
                .listing(&CacheEntry::present(vec![]), "users", "global", None)
                .is_none()
        );
        assert_eq!(findings[1].status, Status::Ok);
        assert_eq!(findings[1].message, "No users found");

        let entry = CacheEntry::present(vec![json!({ "UserName": "a" })]);
        assert_eq!(findings.listing(&entry, "users", "global", None).map(<[Value]>::len), Some(1));
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_collect_batches_in_order() {
        let batches = (0..3).map(|i| {
            let mut batch = Findings::new();
            batch.ok(format!("batch {i}"), "r", None);
            batch
        });
        let all: Findings = batches.collect();
        assert_eq!(all[2].message, "batch 2");
    }
}
