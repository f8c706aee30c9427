// SPDX-License-Identifier: Apache-2.0

//! IAM users must carry at least one tag.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::check::{Check, CheckContext, CheckMetadata};
use crate::finding::{Findings, GLOBAL_REGION};

const METADATA: CheckMetadata = CheckMetadata {
    id: "iamUsersHasTags",
    title: "IAM Users Has Tags",
    category: "IAM",
    domain: "Identity and Access management",
    description: "Ensure IAM users have tags",
    more_info: "Tags help you to group resources together that are related to or associated with each other.",
    link: "https://docs.aws.amazon.com/IAM/latest/UserGuide/id_tags_users.html",
    recommended_action: "Modify IAM User and add tags",
    apis: &["IAM:listUsers"],
    settings: &[],
};

/// Flags IAM users without tags.
#[derive(Debug, Default)]
pub struct IamUsersHasTags;

#[async_trait]
impl Check for IamUsersHasTags {
    fn metadata(&self) -> &CheckMetadata {
        &METADATA
    }

    async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Findings> {
        let mut findings = Findings::new();
        let entry = ctx.lookup(&["iam", "listUsers", ctx.default_region()])?;
        let Some(users) = findings.listing(&entry, "users", GLOBAL_REGION, None) else {
            return Ok(findings);
        };

        for user in users {
            let arn = user.get("Arn").and_then(Value::as_str);
            let tagged = user
                .get("Tags")
                .and_then(Value::as_array)
                .is_some_and(|tags| !tags.is_empty());

            if tagged {
                findings.ok("IAM User has Tag specified", GLOBAL_REGION, arn);
            } else {
                findings.fail("IAM User has no Tag", GLOBAL_REGION, arn);
            }
        }

        Ok(findings)
    }
}
