//! Classifies raw package records into package descriptors.
//!
//! Rules are checked in priority order: bundled base packages are skipped,
//! then CRAN, GitHub and Bioconductor markers resolve, and anything else is
//! rejected so the caller can warn and drop it.

use crate::source_field;
use envcast_schema::{GitHubRemote, PackageDescriptor, Provenance, RawPackageRecord};
use std::collections::BTreeMap;

/// Packages shipped with every R installation.
pub const R_BASE_PACKAGES: &[&str] = &[
    "base",
    "compiler",
    "datasets",
    "grDevices",
    "graphics",
    "grid",
    "methods",
    "parallel",
    "splines",
    "stats",
    "stats4",
    "tcltk",
    "tools",
    "utils",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(PackageDescriptor),
    /// Part of the R runtime itself; nothing to install.
    Bundled,
    Rejected,
}

fn is_base_priority(priority: Option<&str>) -> bool {
    priority.is_some_and(|p| p.trim().eq_ignore_ascii_case("base"))
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// GitHub coordinates declared by a record, from either the `Github*` or the
/// `Remote*` field family. A pinned SHA wins over a symbolic ref.
pub fn github_coordinates(record: &RawPackageRecord) -> Option<GitHubRemote> {
    let owner = non_empty(record.github_username.as_ref())
        .or_else(|| non_empty(record.remote_username.as_ref()))?;
    let repo = non_empty(record.github_repo.as_ref())
        .or_else(|| non_empty(record.remote_repo.as_ref()))?;
    let reference = non_empty(record.github_sha1.as_ref())
        .or_else(|| non_empty(record.remote_sha.as_ref()))
        .or_else(|| non_empty(record.github_ref.as_ref()))
        .or_else(|| non_empty(record.remote_ref.as_ref()))
        .unwrap_or("HEAD");
    Some(GitHubRemote::new(owner, repo, reference))
}

/// GitHub remotes known from every record of a snapshot, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    by_name: BTreeMap<String, GitHubRemote>,
}

impl RemoteIndex {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RawPackageRecord>) -> Self {
        let mut by_name = BTreeMap::new();
        for record in records {
            let Some(name) = non_empty(record.package.as_ref()) else {
                continue;
            };
            if let Some(remote) = github_coordinates(record) {
                by_name.entry(name.to_owned()).or_insert(remote);
            }
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&GitHubRemote> {
        self.by_name.get(name)
    }
}

/// Resolve a structured record. `name` must already be validated as present.
pub fn resolve_record(name: &str, record: &RawPackageRecord, remotes: &RemoteIndex) -> Resolution {
    let version = non_empty(record.version.as_ref()).map(str::to_owned);
    let has_github_fields = record.github_repo.is_some() || record.github_username.is_some();

    match (
        record.priority.as_deref(),
        record.repository.as_deref(),
        record.remote_type.as_deref(),
        record.bioc_views.as_deref(),
    ) {
        (priority, ..) if is_base_priority(priority) => Resolution::Bundled,
        (_, Some(repo), ..) if repo.trim().eq_ignore_ascii_case("CRAN") => {
            Resolution::Resolved(PackageDescriptor::cran(name, version))
        }
        (_, _, Some(kind), _) if kind.trim().eq_ignore_ascii_case("github") => {
            github_resolution(name, remotes)
        }
        _ if has_github_fields => github_resolution(name, remotes),
        (_, _, _, Some(_)) => Resolution::Resolved(PackageDescriptor::bioconductor(name, version)),
        _ => Resolution::Rejected,
    }
}

fn github_resolution(name: &str, remotes: &RemoteIndex) -> Resolution {
    match remotes.get(name) {
        Some(remote) => Resolution::Resolved(PackageDescriptor::github(name, remote)),
        None => Resolution::Rejected,
    }
}

/// Resolve a row with a combined `source` field (flattened snapshots and
/// tabular manifests). GitHub rows take their version from the source payload.
pub fn resolve_source_row(
    name: &str,
    version: Option<&str>,
    source: Option<&str>,
    priority: Option<&str>,
) -> Resolution {
    if is_base_priority(priority) || R_BASE_PACKAGES.contains(&name) {
        return Resolution::Bundled;
    }
    let version = version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);
    let Some(field) = source.and_then(source_field::parse) else {
        return Resolution::Rejected;
    };

    match field.provenance() {
        Some(Provenance::Cran) => Resolution::Resolved(PackageDescriptor::cran(name, version)),
        Some(Provenance::GitHub) => match field.github_remote() {
            Some(remote) => Resolution::Resolved(PackageDescriptor::github(name, &remote)),
            None => Resolution::Rejected,
        },
        Some(Provenance::Bioconductor) => {
            Resolution::Resolved(PackageDescriptor::bioconductor(name, version))
        }
        Some(Provenance::Unresolvable) | None => Resolution::Rejected,
    }
}
