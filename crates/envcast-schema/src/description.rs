//! R package `DESCRIPTION` files (Debian control format).
//!
//! A field starts at column zero as `Name: value`; lines that begin with
//! whitespace continue the previous field.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A declared dependency with its optional version constraint, e.g. `(>= 1.0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

/// A parsed project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub fields: BTreeMap<String, String>,
}

impl ProjectManifest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn package(&self) -> Option<&str> {
        self.field("Package")
    }

    pub fn version(&self) -> Option<&str> {
        self.field("Version")
    }

    pub fn repository(&self) -> Option<&str> {
        self.field("Repository")
    }

    pub fn imports(&self) -> Vec<Dependency> {
        self.field("Imports").map(parse_dependency_list).unwrap_or_default()
    }

    pub fn depends(&self) -> Vec<Dependency> {
        self.field("Depends").map(parse_dependency_list).unwrap_or_default()
    }

    /// Remote declarations, one per comma-separated entry.
    pub fn remotes(&self) -> Vec<String> {
        self.field("Remotes")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Minimum R version from `Depends: R (>= x.y.z)`.
    pub fn r_minimum(&self) -> Option<String> {
        let r = self.depends().into_iter().find(|d| d.name == "R")?;
        let constraint = r.constraint?;
        let version = constraint.trim_start_matches(['>', '=', ' ']).trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_owned())
        }
    }
}

fn parse_dependency_list(value: &str) -> Vec<Dependency> {
    value
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (name, constraint) = match entry.split_once('(') {
                Some((name, rest)) => {
                    let c = rest.trim_end().trim_end_matches(')').trim();
                    (name.trim(), (!c.is_empty()).then(|| c.to_owned()))
                }
                None => (entry, None),
            };
            Some(Dependency {
                name: name.to_owned(),
                constraint,
            })
        })
        .collect()
}

pub fn parse_description_str(input: &str) -> Result<ProjectManifest, SchemaError> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with([' ', '\t']) {
            let Some(ref key) = current else {
                return Err(SchemaError::Description {
                    line: idx + 1,
                    reason: "continuation line without a field".to_owned(),
                });
            };
            if let Some(value) = fields.get_mut(key) {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(SchemaError::Description {
                line: idx + 1,
                reason: format!("expected 'Field: value', got '{line}'"),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(SchemaError::Description {
                line: idx + 1,
                reason: "empty field name".to_owned(),
            });
        }
        fields.insert(key.to_owned(), value.trim().to_owned());
        current = Some(key.to_owned());
    }

    Ok(ProjectManifest { fields })
}

pub fn parse_description_file(path: impl AsRef<Path>) -> Result<ProjectManifest, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_description_str(&content)
}
