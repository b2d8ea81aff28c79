//! Data model for envcast.
//!
//! This crate defines the schema layer: canonical package descriptors
//! (`PackageDescriptor`, `Manifest`), the raw record shapes produced by live R
//! sessions and tabular manifests, the DCF `DESCRIPTION` project manifest, the
//! `SourceDescription` input union, TOML generation config (`ConfigV1`) with its
//! validated form (`GenerateOptions`), and the Dockerfile instruction model.

pub mod config;
pub mod description;
pub mod instruction;
pub mod package;
pub mod record;
pub mod source;
pub mod types;

pub use config::{
    parse_config_file, parse_config_str, ConfigV1, CopySelector, GenerateOptions,
    InstalledPackage, Platform, SaveState, Toggle, DEFAULT_STATE_FILE, DEFAULT_WORKDIR,
};
pub use description::{parse_description_file, parse_description_str, Dependency, ProjectManifest};
pub use instruction::{Dockerfile, Instruction};
pub use package::{GitHubRemote, Manifest, PackageDescriptor, Provenance};
pub use record::{
    FlatPackageRow, FlatSession, RawPackageRecord, SessionSnapshot, StructuredSession,
    TabularManifest, TabularRow,
};
pub use source::SourceDescription;
pub use types::{ImageName, PackageName};

use thiserror::Error;

/// File name of a project manifest.
pub const DESCRIPTION_FILE: &str = "DESCRIPTION";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("unsupported config_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("invalid workdir '{0}': must be absolute and end with '/'")]
    InvalidWorkdir(String),
    #[error("invalid platform '{0}', expected '<distribution>:<release>'")]
    InvalidPlatform(String),
    #[error("invalid copy mode '{0}', expected one of: none, script, script_dir")]
    InvalidCopyMode(String),
    #[error("{field} must not be an empty command")]
    EmptyCommand { field: &'static str },
    #[error("DESCRIPTION line {line}: {reason}")]
    Description { line: usize, reason: String },
}
