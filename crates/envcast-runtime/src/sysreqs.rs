use crate::RuntimeError;
use envcast_schema::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const DEFAULT_API: &str = "https://packagemanager.posit.co";

/// A system library package, optionally pinned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemPackage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SystemPackage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SysreqsQuery<'a> {
    pub platform: &'a Platform,
    /// Also report requirements that only optional features need.
    pub soft: bool,
    pub offline: bool,
}

/// Maps R packages to the system libraries they need on a platform.
pub trait SystemRequirements {
    /// Requirements per R package name. Packages without requirements may be absent.
    fn lookup(
        &self,
        packages: &[&str],
        query: &SysreqsQuery<'_>,
    ) -> Result<BTreeMap<String, Vec<SystemPackage>>, RuntimeError>;
}

/// Online lookup against a Posit Package Manager compatible `sysreqs` endpoint.
pub struct HttpSysreqs {
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SysreqsResponse {
    #[serde(default)]
    requirements: Vec<PackageRequirements>,
}

#[derive(Debug, Deserialize)]
struct PackageRequirements {
    name: String,
    requirements: RequirementSet,
}

#[derive(Debug, Deserialize)]
struct RequirementSet {
    #[serde(default)]
    packages: Vec<String>,
}

impl Default for HttpSysreqs {
    fn default() -> Self {
        Self::new(DEFAULT_API)
    }
}

impl HttpSysreqs {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/__api__/repos/cran/sysreqs", self.base_url)
    }
}

impl SystemRequirements for HttpSysreqs {
    fn lookup(
        &self,
        packages: &[&str],
        query: &SysreqsQuery<'_>,
    ) -> Result<BTreeMap<String, Vec<SystemPackage>>, RuntimeError> {
        if query.offline {
            return Err(RuntimeError::Offline(
                "remote system requirement lookup is disabled, configure a sysreqs database"
                    .to_owned(),
            ));
        }
        if packages.is_empty() {
            return Ok(BTreeMap::new());
        }
        if query.soft {
            debug!("remote sysreqs service does not separate soft requirements");
        }

        let url = self.endpoint();
        debug!("GET {url} for {} package(s)", packages.len());
        let mut req = self
            .agent
            .get(&url)
            .query("all", "false")
            .query("distribution", &query.platform.distribution)
            .query("release", &query.platform.release);
        for pkg in packages {
            req = req.query("pkgname", pkg);
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RuntimeError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(RuntimeError::Http(e.to_string())),
        };

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RuntimeError::Http(e.to_string()))?;
        let parsed: SysreqsResponse = serde_json::from_slice(&body)
            .map_err(|e| RuntimeError::Serialization(format!("invalid sysreqs response: {e}")))?;

        Ok(parsed
            .requirements
            .into_iter()
            .map(|r| {
                let pkgs = r
                    .requirements
                    .packages
                    .iter()
                    .map(|p| SystemPackage::new(p))
                    .collect();
                (r.name, pkgs)
            })
            .collect())
    }
}

/// One entry of the offline database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Only needed by optional features.
    #[serde(default)]
    pub soft: bool,
}

/// Offline lookup from a JSON database:
/// `{"<platform>": {"<r package>": [{"name": "libxml2-dev"}]}}`, where
/// `<platform>` is `distribution:release` or just `distribution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticSysreqs {
    platforms: BTreeMap<String, BTreeMap<String, Vec<DatabaseEntry>>>,
}

impl StaticSysreqs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RuntimeError::Serialization(format!("invalid sysreqs database: {e}")))
    }

    #[must_use]
    pub fn with_entry(mut self, platform: &str, package: &str, entry: DatabaseEntry) -> Self {
        self.platforms
            .entry(platform.to_owned())
            .or_default()
            .entry(package.to_owned())
            .or_default()
            .push(entry);
        self
    }

    fn table(&self, platform: &Platform) -> Option<&BTreeMap<String, Vec<DatabaseEntry>>> {
        self.platforms
            .get(&platform.to_string())
            .or_else(|| self.platforms.get(&platform.distribution))
    }
}

impl SystemRequirements for StaticSysreqs {
    fn lookup(
        &self,
        packages: &[&str],
        query: &SysreqsQuery<'_>,
    ) -> Result<BTreeMap<String, Vec<SystemPackage>>, RuntimeError> {
        let Some(table) = self.table(query.platform) else {
            debug!("no offline sysreqs for platform {}", query.platform);
            return Ok(BTreeMap::new());
        };
        let mut out = BTreeMap::new();
        for pkg in packages {
            let Some(entries) = table.get(*pkg) else {
                continue;
            };
            let reqs: Vec<SystemPackage> = entries
                .iter()
                .filter(|e| query.soft || !e.soft)
                .map(|e| SystemPackage {
                    name: e.name.clone(),
                    version: e.version.clone(),
                })
                .collect();
            if !reqs.is_empty() {
                out.insert((*pkg).to_owned(), reqs);
            }
        }
        Ok(out)
    }
}
