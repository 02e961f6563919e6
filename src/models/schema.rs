// HostSync - Schema Versioning
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Schema versioning for the persisted administrative state.

use semver::Version;
use serde::{Deserialize, Serialize};

/// Current schema version of the state snapshot.
pub const CURRENT_SCHEMA_VERSION: &str = "1.1.0";

/// Schema version wrapper for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn current() -> Self {
        Self(CURRENT_SCHEMA_VERSION.to_string())
    }

    pub fn parse(&self) -> Option<Version> {
        Version::parse(&self.0).ok()
    }

    /// A snapshot is readable when its major version matches and its minor
    /// version is not newer than ours.
    pub fn is_compatible(&self) -> bool {
        match (self.parse(), Version::parse(CURRENT_SCHEMA_VERSION).ok()) {
            (Some(this), Some(current)) => this.major == current.major && this.minor <= current.minor,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility() {
        assert!(SchemaVersion::current().is_compatible());
        assert!(SchemaVersion::new("1.0.0").is_compatible());
        assert!(!SchemaVersion::new("1.9.0").is_compatible());
        assert!(!SchemaVersion::new("2.0.0").is_compatible());
        assert!(!SchemaVersion::new("garbage").is_compatible());
    }
}
