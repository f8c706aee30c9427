// SPDX-License-Identifier: Apache-2.0

//! Region and location catalogs.
//!
//! A [`RegionSet`] is the deterministic, catalog-ordered list of regions a
//! check iterates. It depends only on the provider and the [`Settings`].

use crate::config::Settings;

/// Cloud provider whose catalog is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Amazon Web Services regions.
    Aws,
    /// Microsoft Azure locations.
    Azure,
}

const AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-northeast-3",
    "ap-northeast-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ca-central-1",
    "eu-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-south-1",
    "eu-west-3",
    "eu-north-1",
    "me-south-1",
    "sa-east-1",
];

const AWS_GOVCLOUD_REGIONS: &[&str] = &["us-gov-west-1", "us-gov-east-1"];

const AZURE_LOCATIONS: &[&str] = &[
    "eastus",
    "eastus2",
    "westus",
    "westus2",
    "westus3",
    "centralus",
    "northcentralus",
    "southcentralus",
    "westcentralus",
    "canadacentral",
    "canadaeast",
    "brazilsouth",
    "northeurope",
    "westeurope",
    "uksouth",
    "ukwest",
    "francecentral",
    "germanywestcentral",
    "norwayeast",
    "switzerlandnorth",
    "swedencentral",
    "eastasia",
    "southeastasia",
    "japaneast",
    "japanwest",
    "koreacentral",
    "koreasouth",
    "australiaeast",
    "australiasoutheast",
    "australiacentral",
    "centralindia",
    "southindia",
    "westindia",
    "uaenorth",
    "southafricanorth",
];

const AZURE_GOV_LOCATIONS: &[&str] = &[
    "usgovvirginia",
    "usgovtexas",
    "usgovarizona",
    "usdodeast",
    "usdodcentral",
];

/// Known regions for `provider`, in catalog order.
#[must_use]
pub fn catalog(provider: Provider, govcloud: bool) -> &'static [&'static str] {
    match (provider, govcloud) {
        (Provider::Aws, false) => AWS_REGIONS,
        (Provider::Aws, true) => AWS_GOVCLOUD_REGIONS,
        (Provider::Azure, false) => AZURE_LOCATIONS,
        (Provider::Azure, true) => AZURE_GOV_LOCATIONS,
    }
}

/// Region used for account-wide AWS APIs such as IAM.
#[must_use]
pub fn default_region(settings: &Settings) -> &'static str {
    if settings.govcloud {
        "us-gov-west-1"
    } else {
        "us-east-1"
    }
}

/// Ordered set of regions a check iterates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSet(Vec<&'static str>);

impl RegionSet {
    /// Region identifiers in iteration order.
    #[must_use]
    pub fn as_slice(&self) -> &[&'static str] {
        &self.0
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if no region is queryable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterator over region identifiers.
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'static str;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, &'static str>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Resolves the regions to scan for `provider`.
///
/// Returns the catalog filtered by the configured allow-list, in catalog
/// order, or the full catalog when no allow-list is set. Allow-list entries
/// that name no known region are ignored.
#[must_use]
pub fn resolve(provider: Provider, settings: &Settings) -> RegionSet {
    let catalog = catalog(provider, settings.govcloud);
    let regions = match &settings.regions {
        None => catalog.to_vec(),
        Some(allowed) => catalog
            .iter()
            .copied()
            .filter(|region| allowed.iter().any(|a| a == region))
            .collect(),
    };

    if let Some(allowed) = &settings.regions
        && regions.len() < allowed.len()
    {
        tracing::debug!(
            ?provider,
            requested = allowed.len(),
            resolved = regions.len(),
            "Some requested regions are not in the catalog"
        );
    }

    RegionSet(regions)
}
