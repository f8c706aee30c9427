// SPDX-License-Identifier: Apache-2.0

//! Built-in reference checks.
//!
//! Each check consumes the orchestration contract in [`crate::check`] and
//! reads only the cache paths listed in its metadata `apis`.

use std::sync::Arc;

use crate::check::Check;

pub mod aws;
pub mod azure;

/// Every built-in check, in registration order.
#[must_use]
pub fn builtin_checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(aws::Elbv2DeprecatedSslPolicies),
        Arc::new(aws::IamUsersHasTags),
        Arc::new(azure::DbDiagnosticLoggingEnabled),
    ]
}

/// Looks up a built-in check by id.
#[must_use]
pub fn find_check(id: &str) -> Option<Arc<dyn Check>> {
    builtin_checks()
        .into_iter()
        .find(|check| check.metadata().id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let checks = builtin_checks();
        let ids: HashSet<_> = checks.iter().map(|c| c.metadata().id).collect();
        assert_eq!(ids.len(), checks.len());
    }

    #[test]
    fn test_find_check() {
        let check = find_check("iamUsersHasTags").expect("registered");
        assert_eq!(check.metadata().category, "IAM");
        assert!(find_check("nope").is_none());
    }

    #[test]
    fn test_setting_defaults_match_patterns() {
        for check in builtin_checks() {
            for spec in check.metadata().settings {
                let pattern = regex::RegexBuilder::new(spec.pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("pattern compiles");
                assert!(pattern.is_match(spec.default), "{}", spec.key);
            }
        }
    }
}
