//! Generation config (`envcast.toml`) and its validated form.

use crate::types::ImageName;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_WORKDIR: &str = "/payload/";
pub const DEFAULT_STATE_FILE: &str = "envcast-state.json";

/// A setting that is either a plain on/off switch or an explicit value.
///
/// `workdir = false` disables the working directory, `workdir = "/srv/"` sets it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Switch(bool),
    Value(T),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigV1 {
    pub config_version: u32,
    #[serde(default)]
    pub image: ImageSection,
    #[serde(default)]
    pub packages: PackagesSection,
    #[serde(default)]
    pub sysreqs: SysreqsSection,
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub metadata: MetadataSection,
    #[serde(default)]
    pub startup: StartupSection,
    #[serde(default)]
    pub save_state: Option<Toggle<SaveStateSection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub r_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub check_tag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackagesSection {
    #[serde(default)]
    pub include_self: bool,
    #[serde(default)]
    pub include_loaded_only: bool,
    #[serde(default)]
    pub match_versions: bool,
    #[serde(default)]
    pub filter_base_image: bool,
    #[serde(default)]
    pub base_image_packages: Vec<InstalledPackage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SysreqsSection {
    #[serde(default)]
    pub soft: bool,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub match_library_versions: bool,
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutSection {
    #[serde(default)]
    pub workdir: Option<Toggle<String>>,
    #[serde(default)]
    pub copy: Option<String>,
    #[serde(default)]
    pub copy_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataSection {
    #[serde(default)]
    pub maintainer: Option<Toggle<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StartupSection {
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SaveStateSection {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// A package already present in the base image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstalledPackage {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Target operating system used for system dependency lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub distribution: String,
    pub release: String,
}

impl Platform {
    pub fn new(distribution: &str, release: &str) -> Self {
        Self {
            distribution: distribution.to_owned(),
            release: release.to_owned(),
        }
    }

    /// Whether packages are installed with apt.
    pub fn uses_apt(&self) -> bool {
        matches!(self.distribution.as_str(), "ubuntu" | "debian")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.distribution, self.release)
    }
}

impl FromStr for Platform {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((d, r)) if !d.trim().is_empty() && !r.trim().is_empty() => {
                Ok(Self::new(&d.trim().to_lowercase(), r.trim()))
            }
            _ => Err(SchemaError::InvalidPlatform(s.to_owned())),
        }
    }
}

/// Which files end up in the image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopySelector {
    #[default]
    None,
    ScriptOnly,
    ScriptDirectory,
    Paths(Vec<PathBuf>),
}

impl FromStr for CopySelector {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "script" => Ok(Self::ScriptOnly),
            "script_dir" | "script-dir" => Ok(Self::ScriptDirectory),
            _ => Err(SchemaError::InvalidCopyMode(s.to_owned())),
        }
    }
}

/// Extra copy of a serialized state file into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    pub file: String,
    pub items: Vec<String>,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            file: DEFAULT_STATE_FILE.to_owned(),
            items: Vec::new(),
        }
    }
}

/// Validated flags for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub base_image: Option<ImageName>,
    pub r_version: Option<String>,
    pub platform: Option<Platform>,
    pub check_image_tag: bool,
    pub include_self: bool,
    pub include_loaded_only: bool,
    pub match_package_versions: bool,
    pub filter_base_image: bool,
    pub base_image_packages: Vec<InstalledPackage>,
    pub soft_dependencies: bool,
    pub offline: bool,
    pub match_library_versions: bool,
    pub sysreqs_database: Option<PathBuf>,
    pub sysreqs_api: Option<String>,
    pub workdir: Option<String>,
    pub copy: CopySelector,
    pub maintainer: Option<String>,
    pub env: BTreeMap<String, String>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub save_state: Option<SaveState>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            base_image: None,
            r_version: None,
            platform: None,
            check_image_tag: false,
            include_self: false,
            include_loaded_only: false,
            match_package_versions: false,
            filter_base_image: false,
            base_image_packages: Vec::new(),
            soft_dependencies: false,
            offline: false,
            match_library_versions: false,
            sysreqs_database: None,
            sysreqs_api: None,
            workdir: Some(DEFAULT_WORKDIR.to_owned()),
            copy: CopySelector::None,
            maintainer: None,
            env: BTreeMap::new(),
            cmd: None,
            entrypoint: None,
            save_state: None,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if let Some(ref workdir) = self.workdir {
            validate_workdir(workdir)?;
        }
        if self.cmd.as_ref().is_some_and(Vec::is_empty) {
            return Err(SchemaError::EmptyCommand { field: "cmd" });
        }
        if self.entrypoint.as_ref().is_some_and(Vec::is_empty) {
            return Err(SchemaError::EmptyCommand {
                field: "entrypoint",
            });
        }
        Ok(())
    }
}

fn validate_workdir(workdir: &str) -> Result<(), SchemaError> {
    if workdir.starts_with('/') && workdir.ends_with('/') {
        Ok(())
    } else {
        Err(SchemaError::InvalidWorkdir(workdir.to_owned()))
    }
}

impl ConfigV1 {
    /// Validate the config and resolve defaults.
    pub fn normalize(&self) -> Result<GenerateOptions, SchemaError> {
        if self.config_version != 1 {
            return Err(SchemaError::UnsupportedVersion(self.config_version));
        }

        let platform = self
            .image
            .platform
            .as_deref()
            .map(str::parse::<Platform>)
            .transpose()?;

        let workdir = match self.layout.workdir {
            None | Some(Toggle::Switch(true)) => Some(DEFAULT_WORKDIR.to_owned()),
            Some(Toggle::Switch(false)) => None,
            Some(Toggle::Value(ref w)) => Some(w.trim().to_owned()),
        };

        let copy = if self.layout.copy_paths.is_empty() {
            self.layout
                .copy
                .as_deref()
                .map(str::parse::<CopySelector>)
                .transpose()?
                .unwrap_or_default()
        } else {
            CopySelector::Paths(self.layout.copy_paths.clone())
        };

        let maintainer = match self.metadata.maintainer {
            None | Some(Toggle::Switch(_)) => None,
            Some(Toggle::Value(ref m)) => Some(m.trim().to_owned()).filter(|m| !m.is_empty()),
        };

        let save_state = match self.save_state {
            None | Some(Toggle::Switch(false)) => None,
            Some(Toggle::Switch(true)) => Some(SaveState::default()),
            Some(Toggle::Value(ref s)) => Some(SaveState {
                file: s
                    .file
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_owned()),
                items: s.items.clone(),
            }),
        };

        let options = GenerateOptions {
            base_image: self.image.base.as_deref().map(ImageName::from),
            r_version: self.image.r_version.clone(),
            platform,
            check_image_tag: self.image.check_tag,
            include_self: self.packages.include_self,
            include_loaded_only: self.packages.include_loaded_only,
            match_package_versions: self.packages.match_versions,
            filter_base_image: self.packages.filter_base_image,
            base_image_packages: self.packages.base_image_packages.clone(),
            soft_dependencies: self.sysreqs.soft,
            offline: self.sysreqs.offline,
            match_library_versions: self.sysreqs.match_library_versions,
            sysreqs_database: self.sysreqs.database.clone(),
            sysreqs_api: self.sysreqs.api_url.clone(),
            workdir,
            copy,
            maintainer,
            env: self.metadata.env.clone(),
            cmd: self.startup.cmd.clone(),
            entrypoint: self.startup.entrypoint.clone(),
            save_state,
        };
        options.validate()?;
        Ok(options)
    }
}

pub fn parse_config_str(input: &str) -> Result<ConfigV1, SchemaError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ConfigV1, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
