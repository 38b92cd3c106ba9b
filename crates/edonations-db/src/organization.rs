use edonations_common::{Error, Result};
use serde::Serialize;

/// Maximum stored length of `Sponsor.organization`.
pub const ORGANIZATION_MAX_LEN: usize = 300;

/// One permitted organization: the stored code and its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub code: &'static str,
    pub label: &'static str,
}

/// The closed set of valid `Sponsor.organization` values.
///
/// A set is an immutable snapshot; membership only changes when a new schema
/// migration ships a replacement snapshot. The version names the migration
/// that introduced it.
#[derive(Debug, Clone, Copy)]
pub struct OrganizationSet {
    version: &'static str,
    entries: &'static [Organization],
}

/// Snapshot shipped with `0003_organization_choices`.
const ORGANIZATIONS_0003: &[Organization] = &[
    Organization {
        code: "COVID-19",
        label: "COVID-19",
    },
    Organization {
        code: "MAKEDONIA",
        label: "MAKEDONIA",
    },
    Organization {
        code: "SELE ENAT CHARITABLE",
        label: "SELE ENAT CHARITABLE",
    },
    Organization {
        code: "ETHIOPIAN CENTER FOR DISABILITY AND DEVELOPMENT",
        label: "ETHIOPIAN CENTER FOR DISABILITY AND DEVELOPMENT",
    },
];

impl OrganizationSet {
    pub const fn new(version: &'static str, entries: &'static [Organization]) -> Self {
        Self { version, entries }
    }

    /// The snapshot validated against by the current schema.
    pub fn current() -> Self {
        Self::new("0003_organization_choices", ORGANIZATIONS_0003)
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    /// (code, label) pairs in declaration order, for single-select controls.
    pub fn entries(&self) -> &'static [Organization] {
        self.entries
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|o| o.code == code)
    }

    pub fn label_for(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|o| o.code == code)
            .map(|o| o.label)
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|o| o.code).collect()
    }

    /// Write-time check for a candidate `organization` value. Blank values are
    /// permitted; non-blank values must be a member of this set and fit the
    /// column length.
    pub fn validate(&self, value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if value.chars().count() > ORGANIZATION_MAX_LEN || !self.contains(value) {
            return Err(Error::validation("organization", value, &self.codes()));
        }
        Ok(())
    }
}
