// SPDX-License-Identifier: Apache-2.0

//! ELBv2 listeners must not use deprecated SSL policies.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::cache::UNKNOWN_ERROR;
use crate::check::{Check, CheckContext, CheckMetadata};
use crate::finding::Findings;
use crate::regions::Provider;

/// Predefined ELB security policies that allow obsolete protocols or ciphers.
pub const DEPRECATED_POLICIES: &[&str] = &[
    "ELBSecurityPolicy-2011-08",
    "ELBSecurityPolicy-2014-01",
    "ELBSecurityPolicy-2014-10",
    "ELBSecurityPolicy-2015-02",
    "ELBSecurityPolicy-2015-03",
    "ELBSecurityPolicy-2015-05",
    "ELBSecurityPolicy-TLS-1-0-2015-04",
    "ELBSample-ELBDefaultCipherPolicy",
    "ELBSample-OpenSSLDefaultCipherPolicy",
];

const METADATA: CheckMetadata = CheckMetadata {
    id: "elbv2DeprecatedSslPolicies",
    title: "ELBv2 Deprecated SSL Policies",
    category: "ELBv2",
    domain: "Content Delivery",
    description: "Ensure that Elbv2 listeners are configured to use the latest predefined security policies.",
    more_info: "Insecure or deprecated security policies can expose the client and the load balancer to various vulnerabilities.",
    link: "https://docs.aws.amazon.com/elasticloadbalancing/latest/application/create-https-listener.html",
    recommended_action: "Modify ELBv2 listeners with the latest predefined AWS security policies.",
    apis: &["ELBv2:describeLoadBalancers", "ELBv2:describeListeners"],
    settings: &[],
};

/// Flags load balancers whose listeners use a deprecated SSL policy.
#[derive(Debug, Default)]
pub struct Elbv2DeprecatedSslPolicies;

impl Elbv2DeprecatedSslPolicies {
    async fn scan_region(&self, ctx: &CheckContext<'_>, region: &'static str) -> Result<Findings> {
        let mut findings = Findings::new();
        let entry = ctx.lookup(&["elbv2", "describeLoadBalancers", region])?;
        let Some(load_balancers) = findings.listing(&entry, "load balancers", region, None) else {
            return Ok(findings);
        };

        let per_lb = ctx
            .fan_out(load_balancers, |lb| async move {
                self.scan_load_balancer(ctx, region, lb)
            })
            .await?;
        findings.append(per_lb);
        Ok(findings)
    }

    fn scan_load_balancer(
        &self,
        ctx: &CheckContext<'_>,
        region: &'static str,
        lb: &Value,
    ) -> Result<Findings> {
        let mut findings = Findings::new();
        let arn = lb.get("LoadBalancerArn").and_then(Value::as_str);
        let name = lb
            .get("LoadBalancerName")
            .and_then(Value::as_str)
            .or(arn)
            .unwrap_or("unnamed");

        let Some(dns_name) = lb.get("DNSName").and_then(Value::as_str) else {
            findings.unknown(
                format!("Elbv2 load balancer {name} has no DNS name to query Listeners by"),
                region,
                arn,
            );
            return Ok(findings);
        };

        let entry = ctx.lookup(&["elbv2", "describeListeners", region, dns_name])?;
        // A listed load balancer whose listeners were never collected is
        // still reported.
        if entry.is_absent() {
            findings.unknown(
                format!("Unable to query for Listeners: {UNKNOWN_ERROR}"),
                region,
                arn,
            );
            return Ok(findings);
        }
        let Some(records) = findings.listing(&entry, "Listeners", region, arn) else {
            return Ok(findings);
        };

        let listeners = listener_records(records);
        if listeners.is_empty() {
            findings.ok("No Listeners found", region, arn);
            return Ok(findings);
        }

        let policies: Vec<&str> = listeners
            .iter()
            .filter_map(|l| l.get("SslPolicy").and_then(Value::as_str))
            .collect();
        if policies.is_empty() {
            findings.ok("No SSL policies found", region, arn);
            return Ok(findings);
        }

        let mut deprecated: Vec<&str> = Vec::new();
        for policy in policies {
            if DEPRECATED_POLICIES.contains(&policy) && !deprecated.contains(&policy) {
                deprecated.push(policy);
            }
        }

        if deprecated.is_empty() {
            findings.ok(
                format!("Elbv2 load balancer {name} listeners are using current SSL policies"),
                region,
                arn,
            );
        } else {
            findings.fail(
                format!(
                    "Elbv2 load balancer {name} listeners are using following deprecated policies: {}",
                    deprecated.join(", ")
                ),
                region,
                arn,
            );
        }
        Ok(findings)
    }
}

/// Listener objects from a listener listing.
///
/// Records are either listeners or `DescribeListeners` response pages that
/// wrap a `Listeners` array.
fn listener_records(records: &[Value]) -> Vec<&Value> {
    records
        .iter()
        .flat_map(|record| match record.get("Listeners") {
            Some(Value::Array(listeners)) => listeners.iter().collect::<Vec<_>>(),
            Some(_) => Vec::new(),
            None => vec![record],
        })
        .collect()
}

#[async_trait]
impl Check for Elbv2DeprecatedSslPolicies {
    fn metadata(&self) -> &CheckMetadata {
        &METADATA
    }

    async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Findings> {
        let regions = ctx.regions(Provider::Aws);
        ctx.fan_out(regions.iter(), |region| self.scan_region(ctx, region))
            .await
    }
}
