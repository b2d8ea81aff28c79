//! Raw package records as produced by a live R session or a tabular manifest.
//!
//! Every attribute is optional; classifying a record is the job of the
//! provenance resolver, not of deserialization.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One installed package as described by its `DESCRIPTION` metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPackageRecord {
    #[serde(rename = "Package", default)]
    pub package: Option<String>,
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    #[serde(rename = "Priority", default)]
    pub priority: Option<String>,
    #[serde(rename = "Repository", default)]
    pub repository: Option<String>,
    #[serde(rename = "RemoteType", default)]
    pub remote_type: Option<String>,
    #[serde(rename = "GithubUsername", default)]
    pub github_username: Option<String>,
    #[serde(rename = "GithubRepo", default)]
    pub github_repo: Option<String>,
    #[serde(rename = "GithubRef", default)]
    pub github_ref: Option<String>,
    #[serde(rename = "GithubSHA1", default)]
    pub github_sha1: Option<String>,
    #[serde(rename = "RemoteUsername", default)]
    pub remote_username: Option<String>,
    #[serde(rename = "RemoteRepo", default)]
    pub remote_repo: Option<String>,
    #[serde(rename = "RemoteRef", default)]
    pub remote_ref: Option<String>,
    #[serde(rename = "RemoteSha", default)]
    pub remote_sha: Option<String>,
    #[serde(rename = "biocViews", default)]
    pub bioc_views: Option<String>,
}

impl RawPackageRecord {
    pub fn named(name: &str, version: &str) -> Self {
        Self {
            package: Some(name.to_owned()),
            version: Some(version.to_owned()),
            ..Self::default()
        }
    }
}

/// Structured snapshot: attached and loaded-only packages with full metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredSession {
    pub r_version: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub base_packages: Vec<String>,
    #[serde(default)]
    pub attached: Vec<RawPackageRecord>,
    #[serde(default)]
    pub loaded_only: Vec<RawPackageRecord>,
}

/// One row of a flattened snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPackageRow {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Flattened snapshot: one row per package with a combined `source` field
/// such as `CRAN (R 4.3.1)` or `Github (owner/repo@ref)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlatSession {
    pub r_version: String,
    #[serde(default)]
    pub platform: Option<String>,
    pub packages: Vec<FlatPackageRow>,
}

/// A point-in-time record of the packages present in an executed environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionSnapshot {
    Flattened(FlatSession),
    Structured(StructuredSession),
}

impl SessionSnapshot {
    pub fn r_version(&self) -> &str {
        match self {
            Self::Flattened(s) => &s.r_version,
            Self::Structured(s) => &s.r_version,
        }
    }

    pub fn platform(&self) -> Option<&str> {
        match self {
            Self::Flattened(s) => s.platform.as_deref(),
            Self::Structured(s) => s.platform.as_deref(),
        }
    }

    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One `name / version / source` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularRow {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl TabularRow {
    pub fn new(name: &str, version: &str, source: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            version: Some(version.to_owned()),
            source: Some(source.to_owned()),
        }
    }
}

/// A hand-written package table.
///
/// TOML form uses `[[package]]` tables; JSON form is a bare array of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabularManifest {
    #[serde(rename = "package", default)]
    pub rows: Vec<TabularRow>,
}

impl TabularManifest {
    pub fn from_toml_str(input: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let rows: Vec<TabularRow> = serde_json::from_str(input)?;
        Ok(Self { rows })
    }

    /// Load from `.json` or TOML (any other extension).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }
}
