use crate::types::PackageName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry a package must be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Cran,
    #[serde(rename = "github")]
    GitHub,
    Bioconductor,
    Unresolvable,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cran => "CRAN",
            Self::GitHub => "GitHub",
            Self::Bioconductor => "Bioconductor",
            Self::Unresolvable => "unresolvable",
        }
    }

    /// Map a source keyword (`CRAN`, `Github`, `Bioconductor`, ...) to a provenance.
    /// Matching is case-insensitive; unknown keywords yield `None`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "cran" => Some(Self::Cran),
            "github" => Some(Self::GitHub),
            "bioconductor" | "bioc" => Some(Self::Bioconductor),
            _ => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pinned GitHub source: `owner/repo[/subdir]@ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRemote {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    pub reference: String,
}

impl GitHubRemote {
    pub fn new(owner: &str, repo: &str, reference: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            subdir: None,
            reference: reference.to_owned(),
        }
    }

    /// Parse `owner/repo[/subdir][@ref]`. A missing ref becomes `HEAD`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (path, reference) = match spec.split_once('@') {
            Some((path, r)) if !r.trim().is_empty() => (path, r.trim()),
            Some(_) => return None,
            None => (spec, "HEAD"),
        };
        let mut parts = path.splitn(3, '/');
        let owner = parts.next()?.trim();
        let repo = parts.next()?.trim();
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        let subdir = parts
            .next()
            .map(|s| s.trim().trim_end_matches('/').to_owned())
            .filter(|s| !s.is_empty());
        Some(Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            subdir,
            reference: reference.to_owned(),
        })
    }
}

impl fmt::Display for GitHubRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)?;
        if let Some(ref subdir) = self.subdir {
            write!(f, "/{subdir}")?;
        }
        write!(f, "@{}", self.reference)
    }
}

/// Canonical record of one dependency.
///
/// For GitHub packages `version` holds the `owner/repo@ref` install spec rather
/// than a package version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: PackageName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub provenance: Provenance,
}

impl PackageDescriptor {
    pub fn new(
        name: impl Into<PackageName>,
        version: Option<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            provenance,
        }
    }

    pub fn cran(name: impl Into<PackageName>, version: Option<String>) -> Self {
        Self::new(name, version, Provenance::Cran)
    }

    pub fn bioconductor(name: impl Into<PackageName>, version: Option<String>) -> Self {
        Self::new(name, version, Provenance::Bioconductor)
    }

    pub fn github(name: impl Into<PackageName>, remote: &GitHubRemote) -> Self {
        Self::new(name, Some(remote.to_string()), Provenance::GitHub)
    }
}

/// Ordered list of resolved packages for one build. Order is preserved for
/// reproducible output but carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub packages: Vec<PackageDescriptor>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, package: PackageDescriptor) {
        self.packages.push(package);
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageDescriptor> {
        self.packages.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn with_provenance(
        &self,
        provenance: Provenance,
    ) -> impl Iterator<Item = &PackageDescriptor> + '_ {
        self.packages
            .iter()
            .filter(move |p| p.provenance == provenance)
    }

    pub fn retain(&mut self, f: impl FnMut(&PackageDescriptor) -> bool) {
        self.packages.retain(f);
    }
}

impl FromIterator<PackageDescriptor> for Manifest {
    fn from_iter<I: IntoIterator<Item = PackageDescriptor>>(iter: I) -> Self {
        Self {
            packages: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Manifest {
    type Item = PackageDescriptor;
    type IntoIter = std::vec::IntoIter<PackageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a PackageDescriptor;
    type IntoIter = std::slice::Iter<'a, PackageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}
