// SPDX-License-Identifier: Apache-2.0

//! Azure checks.

pub mod db_diagnostic_logging_enabled;

pub use db_diagnostic_logging_enabled::DbDiagnosticLoggingEnabled;
