//! Base image selection and install step generation.

use crate::diagnostics::{Diagnostics, Warning};
use crate::CoreError;
use envcast_runtime::{SysreqsQuery, SystemRequirements, TagLister};
use envcast_schema::{
    GenerateOptions, ImageName, Instruction, Manifest, PackageDescriptor, Platform, Provenance,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub const R_IMAGE_REPOSITORY: &str = "rocker/r-ver";
pub const LATEST_TAG: &str = "latest";
const CRAN_MIRROR: &str = "https://cloud.r-project.org";

/// Numeric components of a version such as `4.2.3` or `1.5-4`.
fn version_key(version: &str) -> Option<Vec<u32>> {
    let parts: Option<Vec<u32>> = version
        .trim()
        .split(['.', '-'])
        .map(|p| p.parse().ok())
        .collect();
    parts.filter(|p| !p.is_empty())
}

/// Platform the `rocker/r-ver` image of an R version is built on.
pub fn default_platform(r_version: Option<&str>) -> Platform {
    let Some(key) = r_version.and_then(version_key) else {
        return Platform::new("ubuntu", "24.04");
    };
    if key < vec![4, 0] {
        Platform::new("debian", "9")
    } else if key < vec![4, 2] {
        Platform::new("ubuntu", "20.04")
    } else if key <= vec![4, 4, 1] {
        Platform::new("ubuntu", "22.04")
    } else {
        Platform::new("ubuntu", "24.04")
    }
}

/// Choose the base image: explicit override, else the R image for `r_version`.
///
/// With tag checking enabled, an unpublished tag falls back to `latest` with a
/// warning; an unreachable registry aborts.
pub fn resolve_base_image(
    options: &GenerateOptions,
    r_version: Option<&str>,
    tags: &dyn TagLister,
    diag: &mut Diagnostics,
) -> Result<ImageName, CoreError> {
    let image = match (&options.base_image, r_version) {
        (Some(explicit), _) => explicit.clone(),
        (None, Some(version)) => ImageName::tagged(R_IMAGE_REPOSITORY, version),
        (None, None) => ImageName::tagged(R_IMAGE_REPOSITORY, LATEST_TAG),
    };

    let Some(tag) = image.tag().filter(|t| *t != LATEST_TAG) else {
        return Ok(image);
    };
    if !options.check_image_tag {
        return Ok(image);
    }

    let available = tags.list_tags(image.repository())?;
    if available.iter().any(|t| t == tag) {
        debug!("tag {tag} is published for {}", image.repository());
        return Ok(image);
    }
    let fallback = ImageName::tagged(image.repository(), LATEST_TAG);
    diag.warn(Warning::MissingImageTag {
        image: image.to_string(),
        fallback: fallback.to_string(),
    });
    Ok(fallback)
}

/// Drop packages the base image already provides.
pub fn filter_base_image(manifest: &Manifest, options: &GenerateOptions) -> Manifest {
    if !options.filter_base_image {
        return manifest.clone();
    }
    manifest
        .iter()
        .filter(|p| {
            let present = options.base_image_packages.iter().any(|installed| {
                p.name == installed.name.as_str()
                    && (!options.match_package_versions || p.version == installed.version)
            });
            if present {
                debug!("{} is already installed in the base image", p.name);
            }
            !present
        })
        .cloned()
        .collect()
}

/// One shell step installing every system library the manifest needs.
pub fn system_dependencies(
    manifest: &Manifest,
    platform: &Platform,
    sysreqs: &dyn SystemRequirements,
    options: &GenerateOptions,
) -> Result<Option<Instruction>, CoreError> {
    if manifest.is_empty() {
        return Ok(None);
    }
    let names = manifest.names();
    let query = SysreqsQuery {
        platform,
        soft: options.soft_dependencies,
        offline: options.offline,
    };
    let found = sysreqs.lookup(&names, &query)?;

    let libraries: BTreeSet<String> = found
        .values()
        .flatten()
        .map(|lib| match (&lib.version, options.match_library_versions) {
            (Some(version), true) => format!("{}={version}", lib.name),
            _ => lib.name.clone(),
        })
        .collect();
    if libraries.is_empty() {
        return Ok(None);
    }
    info!(
        "{} system package(s) required on {platform}",
        libraries.len()
    );

    let list = libraries.into_iter().collect::<Vec<_>>().join(" ");
    let command = if platform.uses_apt() {
        format!(
            "export DEBIAN_FRONTEND=noninteractive; apt-get -y update && apt-get install -y {list}"
        )
    } else {
        format!("dnf install -y {list}")
    };
    Ok(Some(Instruction::Shell { command }))
}

/// Packages of one provenance, sorted by name with duplicates removed.
fn sorted_unique(manifest: &Manifest, provenance: Provenance) -> Vec<&PackageDescriptor> {
    let by_name: BTreeMap<&str, &PackageDescriptor> = manifest
        .with_provenance(provenance)
        .map(|p| (p.name.as_str(), p))
        .collect();
    by_name.into_values().collect()
}

fn r_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

fn install2r<'a>(packages: impl IntoIterator<Item = &'a str>) -> Instruction {
    let mut args = vec!["install2.r", "--error", "--skipinstalled"];
    args.extend(packages);
    Instruction::run(&args)
}

fn rscript(expression: &str) -> Instruction {
    Instruction::run(&["Rscript", "-e", expression])
}

/// R package install steps: CRAN, then Bioconductor, then GitHub.
pub fn package_steps(manifest: &Manifest, options: &GenerateOptions) -> Vec<Instruction> {
    let mut steps = Vec::new();

    let cran = sorted_unique(manifest, Provenance::Cran);
    let (pinned, unpinned): (Vec<_>, Vec<_>) = cran
        .into_iter()
        .partition(|p| options.match_package_versions && p.version.is_some());
    if !unpinned.is_empty() {
        steps.push(install2r(unpinned.iter().map(|p| p.name.as_str())));
    }
    for package in pinned {
        let version = package.version.as_deref().unwrap_or_default();
        steps.push(rscript(&format!(
            "remotes::install_version({}, version = {}, repos = {})",
            r_string(&package.name),
            r_string(version),
            r_string(CRAN_MIRROR)
        )));
    }

    let bioc = sorted_unique(manifest, Provenance::Bioconductor);
    if !bioc.is_empty() {
        steps.push(install2r(["BiocManager"]));
        let names: Vec<String> = bioc.iter().map(|p| r_string(&p.name)).collect();
        steps.push(rscript(&format!(
            "BiocManager::install(c({}), update = FALSE, ask = FALSE)",
            names.join(", ")
        )));
    }

    let github = sorted_unique(manifest, Provenance::GitHub);
    if !github.is_empty() {
        let mut args = vec!["installGithub.r".to_owned()];
        args.extend(github.iter().filter_map(|p| p.version.clone()));
        steps.push(Instruction::run(&args));
    }

    steps
}

/// All install instructions for the manifest on `platform`.
pub fn build_install(
    manifest: &Manifest,
    platform: &Platform,
    sysreqs: &dyn SystemRequirements,
    options: &GenerateOptions,
) -> Result<Vec<Instruction>, CoreError> {
    let manifest = filter_base_image(manifest, options);
    let mut steps = Vec::new();
    if let Some(system) = system_dependencies(&manifest, platform, sysreqs, options)? {
        steps.push(system);
    }
    steps.extend(package_steps(&manifest, options));
    Ok(steps)
}
