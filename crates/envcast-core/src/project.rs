//! Project manifest (`DESCRIPTION`) extraction.

use crate::diagnostics::{Diagnostics, Warning};
use crate::extract::Extraction;
use crate::provenance::R_BASE_PACKAGES;
use crate::CoreError;
use envcast_schema::{GitHubRemote, Manifest, PackageDescriptor, ProjectManifest, Provenance};
use tracing::debug;

/// Provenance of the project itself when it declares a public package index.
fn published_provenance(repository: &str) -> Option<Provenance> {
    match repository.trim().to_ascii_lowercase().as_str() {
        "cran" => Some(Provenance::Cran),
        "bioconductor" | "bioc" => Some(Provenance::Bioconductor),
        _ => None,
    }
}

/// Parse one `Remotes` entry, `[type::]owner/repo[/subdir][@ref]`.
/// Only GitHub remotes (no type, or `github::`) are supported.
fn parse_remote(remote: &str) -> Option<GitHubRemote> {
    let spec = match remote.split_once("::") {
        Some((kind, rest)) if kind.trim().eq_ignore_ascii_case("github") => rest,
        Some(_) => return None,
        None => remote,
    };
    // Bare URLs.
    if spec.contains("://") {
        return None;
    }
    GitHubRemote::parse(spec)
}

pub fn extract_project(
    project: &ProjectManifest,
    diag: &mut Diagnostics,
) -> Result<Extraction, CoreError> {
    let mut manifest: Manifest = project
        .imports()
        .into_iter()
        .filter(|dep| !R_BASE_PACKAGES.contains(&dep.name.as_str()))
        .map(|dep| PackageDescriptor::cran(dep.name, None))
        .collect();

    for remote in project.remotes() {
        let Some(github) = parse_remote(&remote) else {
            diag.warn(Warning::UnsupportedRemoteKind { remote });
            continue;
        };
        let descriptor = PackageDescriptor::github(github.repo.as_str(), &github);
        manifest.retain(|p| p.name != descriptor.name);
        manifest.push(descriptor);
    }

    if let Some(provenance) = project.repository().and_then(published_provenance) {
        let name = project
            .package()
            .ok_or_else(|| CoreError::MissingRequiredField {
                field: "Package",
                record: envcast_schema::DESCRIPTION_FILE.to_owned(),
            })?;
        let own = PackageDescriptor::new(name, project.version().map(str::to_owned), provenance);
        manifest = std::iter::once(own).chain(manifest).collect();
    }

    debug!(
        "project manifest declares {} installable package(s)",
        manifest.len()
    );
    Ok(Extraction {
        manifest,
        r_version: project.r_minimum(),
        ..Extraction::default()
    })
}
