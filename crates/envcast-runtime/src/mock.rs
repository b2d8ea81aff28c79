//! In-memory collaborators for tests and dry runs.

use crate::executor::SessionExecutor;
use crate::registry::TagLister;
use crate::sysreqs::{SysreqsQuery, SystemPackage, SystemRequirements};
use crate::RuntimeError;
use envcast_schema::SessionSnapshot;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Returns a fixed snapshot and records every request.
pub struct MockExecutor {
    snapshot: SessionSnapshot,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, as `script:<path>`, `document:<path>` or `expr:<n>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<SessionSnapshot, RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .push(call);
        Ok(self.snapshot.clone())
    }
}

impl SessionExecutor for MockExecutor {
    fn run_script(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError> {
        self.record(format!("script:{}", path.display()))
    }

    fn render_document(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError> {
        self.record(format!("document:{}", path.display()))
    }

    fn evaluate(&self, expressions: &[String]) -> Result<SessionSnapshot, RuntimeError> {
        self.record(format!("expr:{}", expressions.len()))
    }
}

/// Fixed package-to-library table, independent of platform.
#[derive(Default)]
pub struct MockSysreqs {
    table: BTreeMap<String, Vec<SystemPackage>>,
}

impl MockSysreqs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, package: &str, libs: &[&str]) -> Self {
        self.table.insert(
            package.to_owned(),
            libs.iter().map(|l| SystemPackage::new(l)).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_pinned(mut self, package: &str, lib: &str, version: &str) -> Self {
        self.table
            .entry(package.to_owned())
            .or_default()
            .push(SystemPackage {
                name: lib.to_owned(),
                version: Some(version.to_owned()),
            });
        self
    }
}

impl SystemRequirements for MockSysreqs {
    fn lookup(
        &self,
        packages: &[&str],
        _query: &SysreqsQuery<'_>,
    ) -> Result<BTreeMap<String, Vec<SystemPackage>>, RuntimeError> {
        Ok(packages
            .iter()
            .filter_map(|p| self.table.get(*p).map(|r| ((*p).to_owned(), r.clone())))
            .collect())
    }
}

/// Fixed tag list, or a simulated outage.
pub struct MockTags {
    tags: Option<Vec<String>>,
}

impl MockTags {
    pub fn new(tags: &[&str]) -> Self {
        Self {
            tags: Some(tags.iter().map(|t| (*t).to_owned()).collect()),
        }
    }

    pub fn unreachable() -> Self {
        Self { tags: None }
    }
}

impl TagLister for MockTags {
    fn list_tags(&self, repository: &str) -> Result<Vec<String>, RuntimeError> {
        self.tags.clone().ok_or_else(|| RuntimeError::Unreachable {
            endpoint: format!("mock://{repository}/tags"),
            reason: "simulated outage".to_owned(),
        })
    }
}
