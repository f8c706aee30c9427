// SPDX-License-Identifier: Apache-2.0

//! Check orchestration contract.
//!
//! A check implements [`Check::evaluate`] against a [`CheckContext`]. The
//! context owns the provenance trace, resolves regions, validates tunables,
//! and fans work out over regions or resources with a bounded number of
//! branches in flight. [`run_check`] drives one check to completion and
//! returns its findings together with the trace of every lookup it made.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use regex::RegexBuilder;
use serde::Serialize;
use tracing::{Instrument, debug, info_span, warn};

use crate::Result;
use crate::cache::{self, CacheEntry, ResponseCache};
use crate::config::Settings;
use crate::finding::Findings;
use crate::provenance::ProvenanceTrace;
use crate::regions::{self, Provider, RegionSet};

/// A tunable a check accepts through [`Settings::checks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSpec {
    /// Key under `[checks]`.
    pub key: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// What the tunable controls.
    pub description: &'static str,
    /// Case-insensitive pattern a configured value must match.
    pub pattern: &'static str,
    /// Value used when none is configured or the configured one is invalid.
    pub default: &'static str,
}

/// Descriptive metadata for a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckMetadata {
    /// Stable identifier (e.g., `elbv2DeprecatedSslPolicies`).
    pub id: &'static str,
    /// Short title.
    pub title: &'static str,
    /// Service category.
    pub category: &'static str,
    /// Security domain.
    pub domain: &'static str,
    /// What the check ensures.
    pub description: &'static str,
    /// Background for the rule.
    pub more_info: &'static str,
    /// Provider documentation link.
    pub link: &'static str,
    /// Remediation guidance.
    pub recommended_action: &'static str,
    /// Collector APIs the check reads, as `service:operation`.
    pub apis: &'static [&'static str],
    /// Tunables the check accepts.
    pub settings: &'static [SettingSpec],
}

/// One rule evaluated against the response cache.
#[async_trait]
pub trait Check: Send + Sync {
    /// Check metadata.
    fn metadata(&self) -> &CheckMetadata;

    /// Evaluates the rule and returns findings in deterministic order.
    ///
    /// Query failures must be reported as findings. An `Err` is reserved
    /// for malformed caches.
    async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Findings>;
}

/// Per-run state handed to a check.
#[derive(Debug)]
pub struct CheckContext<'a> {
    cache: &'a ResponseCache,
    settings: &'a Settings,
    provenance: Mutex<ProvenanceTrace>,
}

impl<'a> CheckContext<'a> {
    /// Create a context with an empty provenance trace.
    #[must_use]
    pub fn new(cache: &'a ResponseCache, settings: &'a Settings) -> Self {
        Self {
            cache,
            settings,
            provenance: Mutex::new(ProvenanceTrace::new()),
        }
    }

    /// Scan settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// Looks up `path` and records it in the provenance trace.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::MalformedCache` for cache shape faults.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Result<Arc<CacheEntry>> {
        let mut provenance = self
            .provenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache::lookup(self.cache, &mut provenance, path)
    }

    /// Regions of `provider` selected by the settings.
    #[must_use]
    pub fn regions(&self, provider: Provider) -> RegionSet {
        regions::resolve(provider, self.settings)
    }

    /// Region for account-wide APIs.
    #[must_use]
    pub fn default_region(&self) -> &'static str {
        regions::default_region(self.settings)
    }

    /// Configured value of `spec`, falling back to its default.
    ///
    /// A value that does not match the declared pattern is ignored.
    #[must_use]
    pub fn tunable(&self, spec: &SettingSpec) -> String {
        let Some(value) = self.settings.tunable(spec.key) else {
            return spec.default.to_string();
        };

        match RegexBuilder::new(spec.pattern).case_insensitive(true).build() {
            Ok(pattern) if pattern.is_match(value) => value.to_string(),
            Ok(_) => {
                warn!(
                    key = spec.key,
                    value, "Ignoring invalid check setting, using default"
                );
                spec.default.to_string()
            }
            Err(e) => {
                warn!(key = spec.key, error = %e, "Setting pattern does not compile");
                spec.default.to_string()
            }
        }
    }

    /// Runs `branch` for every item with at most `settings.fan_out()` in
    /// flight, then joins.
    ///
    /// Findings are concatenated in item order, not completion order. The
    /// limit applies per call: a branch that fans out again gets its own
    /// `settings.fan_out()` slots.
    ///
    /// # Errors
    ///
    /// Returns the first branch error; remaining branches are dropped.
    pub async fn fan_out<I, F, Fut>(&self, items: I, branch: F) -> Result<Findings>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<Findings>>,
    {
        // Futures are built up front so the stream does not hold `branch`
        // across the await.
        let branches: Vec<Fut> = items.into_iter().map(branch).collect();
        let batches: Vec<Findings> = stream::iter(branches)
            .buffered(self.settings.fan_out())
            .try_collect()
            .await?;
        Ok(batches.into_iter().collect())
    }

    /// Ends the run and hands back the trace.
    #[must_use]
    pub fn finish(self) -> ProvenanceTrace {
        self.provenance
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Findings and provenance of one completed check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Check identifier.
    pub check: String,
    /// Findings in deterministic order.
    pub findings: Findings,
    /// Every lookup the check performed.
    pub source: ProvenanceTrace,
}

/// Runs one check to completion.
///
/// # Errors
///
/// Returns `ScanError::MalformedCache` if the cache shape does not match a
/// lookup the check made.
pub async fn run_check(
    check: &dyn Check,
    cache: &ResponseCache,
    settings: &Settings,
) -> Result<CheckReport> {
    let id = check.metadata().id;
    let span = info_span!("check", check = id);

    async move {
        let started = Instant::now();
        let ctx = CheckContext::new(cache, settings);
        let findings = check.evaluate(&ctx).await?;
        let source = ctx.finish();

        debug!(
            findings = findings.len(),
            lookups = source.len(),
            duration_ms = started.elapsed().as_millis(),
            "Check complete"
        );

        Ok(CheckReport {
            check: id.to_string(),
            findings,
            source,
        })
    }
    .instrument(span)
    .await
}
