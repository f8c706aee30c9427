// SPDX-License-Identifier: Apache-2.0

//! Runs a batch of checks against one response cache.
//!
//! Checks run concurrently with a bounded number in flight. A check that
//! faults or overruns its deadline is reported in its own outcome and never
//! aborts the rest of the batch. Outcomes come back in input order.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::{StreamExt, stream};
use serde::Serialize;

use crate::cache::ResponseCache;
use crate::check::{Check, CheckReport, run_check};
use crate::config::Settings;
use crate::finding::Status;
use crate::plugins::builtin_checks;

/// Default number of checks evaluated concurrently.
pub const DEFAULT_CHECK_CONCURRENCY: usize = 5;

/// Options for a batch scan.
#[derive(Debug, Clone, Builder)]
pub struct ScanOptions {
    /// Maximum number of checks in flight.
    #[builder(default = DEFAULT_CHECK_CONCURRENCY)]
    pub concurrency: usize,
    /// Per-check deadline. The scanner stops waiting once it passes.
    pub check_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of one check within a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The check ran to completion.
    Completed(CheckReport),
    /// The check hit a programming fault such as a malformed cache.
    Faulted {
        /// Check identifier.
        check: String,
        /// Error description.
        error: String,
    },
    /// The deadline passed before the check completed.
    TimedOut {
        /// Check identifier.
        check: String,
    },
}

impl CheckOutcome {
    /// Identifier of the check this outcome belongs to.
    #[must_use]
    pub fn check(&self) -> &str {
        match self {
            CheckOutcome::Completed(report) => &report.check,
            CheckOutcome::Faulted { check, .. } | CheckOutcome::TimedOut { check } => check,
        }
    }
}

/// Finding counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// `Ok` findings.
    pub ok: usize,
    /// `Warn` findings.
    pub warn: usize,
    /// `Fail` findings.
    pub fail: usize,
    /// `Unknown` findings.
    pub unknown: usize,
}

impl StatusCounts {
    fn add(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::Warn => self.warn += 1,
            Status::Fail => self.fail += 1,
            Status::Unknown => self.unknown += 1,
        }
    }
}

/// Result of a batch scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// One outcome per check, in input order.
    pub outcomes: Vec<CheckOutcome>,
}

impl ScanReport {
    /// Reports of the checks that completed.
    pub fn completed(&self) -> impl Iterator<Item = &CheckReport> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            CheckOutcome::Completed(report) => Some(report),
            _ => None,
        })
    }

    /// Number of checks that faulted or timed out.
    #[must_use]
    pub fn incomplete(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o, CheckOutcome::Completed(_)))
            .count()
    }

    /// Tallies findings of all completed checks per status.
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for finding in self.completed().flat_map(|r| r.findings.iter()) {
            counts.add(finding.status);
        }
        counts
    }
}

/// Runs checks against a shared, immutable cache.
pub struct Scanner {
    checks: Vec<Arc<dyn Check>>,
    options: ScanOptions,
}

impl Scanner {
    /// Creates a scanner over `checks`.
    #[must_use]
    pub fn new(checks: Vec<Arc<dyn Check>>, options: ScanOptions) -> Self {
        Self { checks, options }
    }

    /// Creates a scanner over the built-in checks.
    #[must_use]
    pub fn with_builtin_checks(options: ScanOptions) -> Self {
        Self::new(builtin_checks(), options)
    }

    /// Number of registered checks.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    /// Runs every check.
    pub async fn run(&self, cache: &ResponseCache, settings: &Settings) -> ScanReport {
        self.run_with_progress(cache, settings, |_current, _total, _check| {})
            .await
    }

    /// Runs every check, calling `progress` with (current, total, check id)
    /// as each one starts.
    pub async fn run_with_progress<P>(
        &self,
        cache: &ResponseCache,
        settings: &Settings,
        progress: P,
    ) -> ScanReport
    where
        P: Fn(usize, usize, &str) + Send + Sync,
    {
        let total = self.checks.len();
        let progress = &progress;

        let outcomes = stream::iter(self.checks.iter().enumerate())
            .map(|(idx, check)| async move {
                progress(idx + 1, total, check.metadata().id);
                self.run_one(check.as_ref(), cache, settings).await
            })
            .buffered(self.options.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let report = ScanReport { outcomes };
        tracing::debug!(
            checks = total,
            incomplete = report.incomplete(),
            "Scan complete"
        );
        report
    }

    async fn run_one(
        &self,
        check: &dyn Check,
        cache: &ResponseCache,
        settings: &Settings,
    ) -> CheckOutcome {
        let id = check.metadata().id;
        let run = run_check(check, cache, settings);

        let result = match self.options.check_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        check = id,
                        timeout_ms = limit.as_millis(),
                        "Check did not complete before its deadline"
                    );
                    return CheckOutcome::TimedOut {
                        check: id.to_string(),
                    };
                }
            },
            None => run.await,
        };

        match result {
            Ok(report) => CheckOutcome::Completed(report),
            Err(e) => {
                tracing::warn!(check = id, error = %e, "Check faulted");
                CheckOutcome::Faulted {
                    check: id.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::cache::CacheEntry;
    use crate::check::{CheckContext, CheckMetadata};
    use crate::finding::Findings;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn metadata(id: &'static str) -> CheckMetadata {
        CheckMetadata {
            id,
            title: id,
            category: "Test",
            domain: "Test",
            description: "",
            more_info: "",
            link: "",
            recommended_action: "",
            apis: &[],
            settings: &[],
        }
    }

    struct Slow(CheckMetadata);

    #[async_trait]
    impl Check for Slow {
        fn metadata(&self) -> &CheckMetadata {
            &self.0
        }

        async fn evaluate(&self, _ctx: &CheckContext<'_>) -> Result<Findings> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Findings::new())
        }
    }

    struct Broken(CheckMetadata);

    #[async_trait]
    impl Check for Broken {
        fn metadata(&self) -> &CheckMetadata {
            &self.0
        }

        async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Findings> {
            // Path ends on a branch.
            ctx.lookup(&["iam"])?;
            Ok(Findings::new())
        }
    }

    fn cache() -> ResponseCache {
        ResponseCache::new()
            .with(
                &["iam", "listUsers", "us-east-1"],
                CacheEntry::present(vec![json!({ "Arn": "arn:aws:iam::1:user/a", "Tags": [] })]),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_builtin_scan() {
        let scanner = Scanner::with_builtin_checks(ScanOptions::default());
        let report = scanner.run(&cache(), &Settings::default()).await;

        assert_eq!(report.outcomes.len(), scanner.check_count());
        assert_eq!(report.incomplete(), 0);
        assert_eq!(report.outcomes[1].check(), "iamUsersHasTags");
        assert_eq!(
            report.status_counts(),
            StatusCounts {
                fail: 1,
                ..StatusCounts::default()
            }
        );
    }

    #[tokio::test]
    async fn test_fault_and_timeout_do_not_abort_batch() {
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(Broken(metadata("broken"))),
            Arc::new(Slow(metadata("slow"))),
            Arc::new(crate::plugins::aws::IamUsersHasTags),
        ];
        let options = ScanOptions::builder()
            .concurrency(3)
            .check_timeout(Duration::from_millis(20))
            .build();
        let report = Scanner::new(checks, options)
            .run(&cache(), &Settings::default())
            .await;

        assert!(matches!(report.outcomes[0], CheckOutcome::Faulted { ref check, .. } if check == "broken"));
        assert!(matches!(report.outcomes[1], CheckOutcome::TimedOut { ref check } if check == "slow"));
        assert!(matches!(report.outcomes[2], CheckOutcome::Completed(_)));
        assert_eq!(report.incomplete(), 2);
    }

    #[tokio::test]
    async fn test_progress_callback_invocation() {
        let calls = Mutex::new(Vec::new());
        let scanner = Scanner::with_builtin_checks(ScanOptions::builder().concurrency(1).build());

        scanner
            .run_with_progress(&cache(), &Settings::default(), |current, total, check| {
                calls
                    .lock()
                    .unwrap()
                    .push((current, total, check.to_string()));
            })
            .await;

        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (1, 3, "elbv2DeprecatedSslPolicies".to_string()));
        assert_eq!(calls[2].0, 3);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CheckOutcome::TimedOut {
            check: "slow".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "outcome": "timed_out", "check": "slow" })
        );
    }
}
