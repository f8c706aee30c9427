// SPDX-License-Identifier: Apache-2.0

//! SQL databases must send the minimum required diagnostic categories.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::cache::{CacheEntry, UNKNOWN_ERROR};
use crate::check::{Check, CheckContext, CheckMetadata, SettingSpec};
use crate::finding::Findings;
use crate::regions::Provider;

/// Tunable listing the diagnostic categories every database must enable.
pub const DIAGNOSTIC_SETTINGS: SettingSpec = SettingSpec {
    key: "database_diagnostic_settings",
    name: "Database Diagnostic Logs/Metrics settings",
    description: "Comma-separated diagnostic log categories, category groups, or metrics every SQL database must enable.",
    pattern: r"^(Basic|InstanceAndAppAdvanced|WorkloadManagement|SQLInsights|Errors|Timeouts|Blocks|Deadlocks|allLogs|audit)(,\s*(Basic|InstanceAndAppAdvanced|WorkloadManagement|SQLInsights|Errors|Timeouts|Blocks|Deadlocks|allLogs|audit))*$",
    default: "basic,InstanceAndAppAdvanced,WorkloadManagement,audit",
};

const METADATA: CheckMetadata = CheckMetadata {
    id: "dbDiagnosticLoggingEnabled",
    title: "Database Diagnostic Logging Enabled",
    category: "SQL Databases",
    domain: "Databases",
    description: "Ensures diagnostic logging is enabled for SQL databases.",
    more_info: "Diagnostic logging provides insight into SQL database availability, performance, and operation.",
    link: "https://learn.microsoft.com/en-us/azure/azure-sql/database/monitoring-sql-database-azure-monitor",
    recommended_action: "Enable diagnostic logging for SQL databases with the minimum required data recording settings.",
    apis: &[
        "servers:listSql",
        "databases:listByServer",
        "diagnosticSettings:listByDatabase",
    ],
    settings: &[DIAGNOSTIC_SETTINGS],
};

/// Flags SQL databases missing required diagnostic categories.
#[derive(Debug, Default)]
pub struct DbDiagnosticLoggingEnabled;

impl DbDiagnosticLoggingEnabled {
    async fn scan_location(
        &self,
        ctx: &CheckContext<'_>,
        location: &'static str,
        required: &[String],
    ) -> Result<Findings> {
        let mut findings = Findings::new();
        let servers = ctx.lookup(&["servers", "listSql", location])?;
        let Some(servers) = findings.listing(&servers, "SQL servers", location, None) else {
            return Ok(findings);
        };

        for server in servers {
            let Some(server_id) = server.get("id").and_then(Value::as_str) else {
                findings.unknown("SQL server has no id to query databases by", location, None);
                continue;
            };

            let databases = ctx.lookup(&["databases", "listByServer", location, server_id])?;
            let databases = match &*databases {
                CacheEntry::Present(data) if data.is_empty() => {
                    findings.ok("No databases found for SQL server", location, Some(server_id));
                    continue;
                }
                CacheEntry::Present(data) => data,
                other => {
                    findings.unknown(
                        format!(
                            "Unable to query for SQL server databases: {}",
                            other.error_message().unwrap_or_else(|| UNKNOWN_ERROR.to_string())
                        ),
                        location,
                        Some(server_id),
                    );
                    continue;
                }
            };

            for database in databases {
                self.evaluate_database(ctx, location, database, required, &mut findings)?;
            }
        }

        Ok(findings)
    }

    fn evaluate_database(
        &self,
        ctx: &CheckContext<'_>,
        location: &str,
        database: &Value,
        required: &[String],
        findings: &mut Findings,
    ) -> Result<()> {
        let Some(database_id) = database.get("id").and_then(Value::as_str) else {
            findings.unknown("SQL database has no id to query diagnostic settings by", location, None);
            return Ok(());
        };

        let entry = ctx.lookup(&["diagnosticSettings", "listByDatabase", location, database_id])?;
        let settings = match &*entry {
            CacheEntry::Present(data) => data,
            other => {
                findings.unknown(
                    format!(
                        "Unable to query SQL database diagnostic settings: {}",
                        other.error_message().unwrap_or_else(|| UNKNOWN_ERROR.to_string())
                    ),
                    location,
                    Some(database_id),
                );
                return Ok(());
            }
        };

        if settings.is_empty() {
            findings.fail(
                "Diagnostic settings are not configured for SQL database",
                location,
                Some(database_id),
            );
            return Ok(());
        }

        let enabled = enabled_categories(settings);
        let missing: Vec<&str> = required
            .iter()
            .filter(|r| !enabled.contains(*r))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            findings.ok(
                "Database diagnostic settings are configured with minimum requirements",
                location,
                Some(database_id),
            );
        } else {
            findings.fail(
                format!(
                    "Database diagnostic settings are not configured with minimum requirements. Missing: {}",
                    missing.join(", ")
                ),
                location,
                Some(database_id),
            );
        }
        Ok(())
    }
}

/// Lower-cased names of every enabled log category, category group and metric.
fn enabled_categories(settings: &[Value]) -> Vec<String> {
    let mut enabled: Vec<String> = Vec::new();
    let entries = settings.iter().flat_map(|setting| {
        let logs = setting.get("logs").and_then(Value::as_array).into_iter().flatten();
        let metrics = setting.get("metrics").and_then(Value::as_array).into_iter().flatten();
        logs.chain(metrics)
    });

    for entry in entries {
        if !entry.get("enabled").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        let name = entry
            .get("category")
            .and_then(Value::as_str)
            .or_else(|| entry.get("categoryGroup").and_then(Value::as_str));
        if let Some(name) = name.map(str::to_lowercase)
            && !enabled.contains(&name)
        {
            enabled.push(name);
        }
    }
    enabled
}

/// Splits a comma-separated tunable into lower-cased category names.
fn required_categories(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl Check for DbDiagnosticLoggingEnabled {
    fn metadata(&self) -> &CheckMetadata {
        &METADATA
    }

    async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Findings> {
        let required = required_categories(&ctx.tunable(&DIAGNOSTIC_SETTINGS));
        let required = required.as_slice();
        let locations = ctx.regions(Provider::Azure);

        ctx.fan_out(locations.iter(), |location| {
            self.scan_location(ctx, location, required)
        })
        .await
    }
}
