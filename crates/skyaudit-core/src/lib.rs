// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # skyaudit Core
//!
//! Shared execution substrate for cloud security-posture checks.
//!
//! Collectors populate a [`ResponseCache`] with the outcome of every cloud
//! API call. Checks read it through [`CheckContext::lookup`], which
//! classifies each entry as absent, errored or present and records the
//! lookup in a [`ProvenanceTrace`]. Checks report [`Findings`] whose order is
//! deterministic for a given cache, even when regions and resources are
//! processed concurrently.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyaudit_core::{ResponseCache, Settings, plugins, run_check};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = ResponseCache::load(Path::new("cache.json"))?;
//! let settings = skyaudit_core::load_config()?;
//!
//! let check = plugins::find_check("elbv2DeprecatedSslPolicies").expect("built-in");
//! let report = run_check(check.as_ref(), &cache, &settings).await?;
//! for finding in &report.findings {
//!     println!("{} {} {}", finding.status, finding.region, finding.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Response cache, lookups and error formatting
//! - [`check`] - Orchestration contract and check runner
//! - [`config`] - Settings loading
//! - [`error`] - Error types
//! - [`finding`] - Findings and the result collector
//! - [`plugins`] - Built-in reference checks
//! - [`provenance`] - Lookup provenance trace
//! - [`regions`] - Region and location catalogs
//! - [`scan`] - Batch runner for many checks

// ============================================================================
// Error Handling
// ============================================================================

pub use error::ScanError;

/// Convenience Result type for skyaudit operations.
///
/// This is equivalent to `std::result::Result<T, ScanError>`.
pub type Result<T> = std::result::Result<T, ScanError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{Settings, config_dir, config_file_path, load_config, load_config_from};

// ============================================================================
// Cache Facade
// ============================================================================

pub use cache::{CacheEntry, QueryError, ResponseCache, format_error, lookup};
pub use provenance::ProvenanceTrace;

// ============================================================================
// Findings
// ============================================================================

pub use finding::{Finding, Findings, GLOBAL_REGION, Status};

// ============================================================================
// Regions
// ============================================================================

pub use regions::{Provider, RegionSet, default_region};

// ============================================================================
// Orchestration
// ============================================================================

pub use check::{Check, CheckContext, CheckMetadata, CheckReport, SettingSpec, run_check};
pub use scan::{CheckOutcome, ScanOptions, ScanReport, Scanner, StatusCounts};

// ============================================================================
// Modules
// ============================================================================

pub mod cache;
pub mod check;
pub mod config;
pub mod error;
pub mod finding;
pub mod plugins;
pub mod provenance;
pub mod regions;
pub mod scan;
