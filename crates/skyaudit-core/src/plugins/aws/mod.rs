// SPDX-License-Identifier: Apache-2.0

//! AWS checks.

pub mod elbv2_deprecated_ssl_policies;
pub mod iam_users_has_tags;

pub use elbv2_deprecated_ssl_policies::Elbv2DeprecatedSslPolicies;
pub use iam_users_has_tags::IamUsersHasTags;
