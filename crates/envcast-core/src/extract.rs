//! Manifest extractors for session snapshots and tabular manifests.
//!
//! All shapes share one contract: raw records go through the provenance
//! resolver, rejects are reported and dropped, and the tool's own package is
//! removed unless explicitly requested.

use crate::diagnostics::{Diagnostics, Warning};
use crate::discover::FileKind;
use crate::provenance::{resolve_record, resolve_source_row, RemoteIndex, Resolution};
use crate::CoreError;
use envcast_schema::{
    FlatSession, GenerateOptions, Manifest, SessionSnapshot, StructuredSession, TabularManifest,
};
use std::path::PathBuf;
use tracing::debug;

/// Name under which this tool is itself installed as an R package.
pub const SELF_PACKAGE: &str = "envcast";

/// The file selected for packaging, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Everything an extractor learns about the environment.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub manifest: Manifest,
    pub target_file: Option<TargetFile>,
    /// Whether the payload will be copied, so a working directory is needed.
    pub needs_workdir: bool,
    pub r_version: Option<String>,
    /// Snapshot the manifest was derived from, kept for save-state output.
    pub snapshot: Option<SessionSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractFlags {
    pub include_loaded_only: bool,
    pub include_self: bool,
}

impl From<&GenerateOptions> for ExtractFlags {
    fn from(options: &GenerateOptions) -> Self {
        Self {
            include_loaded_only: options.include_loaded_only,
            include_self: options.include_self,
        }
    }
}

/// Applies one resolution to the manifest under construction.
struct Collector<'a> {
    manifest: Manifest,
    flags: ExtractFlags,
    diag: &'a mut Diagnostics,
}

impl<'a> Collector<'a> {
    fn new(flags: ExtractFlags, diag: &'a mut Diagnostics) -> Self {
        Self {
            manifest: Manifest::new(),
            flags,
            diag,
        }
    }

    fn skips_self(&self, name: &str) -> bool {
        !self.flags.include_self && name == SELF_PACKAGE
    }

    fn accept(&mut self, name: &str, resolution: Resolution) {
        match resolution {
            Resolution::Resolved(descriptor) => self.manifest.push(descriptor),
            Resolution::Bundled => debug!("skipping bundled package {name}"),
            Resolution::Rejected => self.diag.warn(Warning::UnresolvableProvenance {
                package: name.to_owned(),
            }),
        }
    }
}

fn required_name<'r>(
    value: Option<&'r String>,
    field: &'static str,
    record: impl FnOnce() -> String,
) -> Result<&'r str, CoreError> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::MissingRequiredField {
            field,
            record: record(),
        })
}

pub fn extract_structured(
    session: &StructuredSession,
    flags: ExtractFlags,
    diag: &mut Diagnostics,
) -> Result<Manifest, CoreError> {
    let remotes = RemoteIndex::from_records(session.attached.iter().chain(&session.loaded_only));

    let mut records: Vec<(&str, usize, _)> = session
        .attached
        .iter()
        .enumerate()
        .map(|(idx, r)| ("attached", idx, r))
        .collect();
    if flags.include_loaded_only {
        records.extend(
            session
                .loaded_only
                .iter()
                .enumerate()
                .map(|(idx, r)| ("loaded_only", idx, r)),
        );
    }

    let mut collector = Collector::new(flags, diag);
    for (group, idx, record) in records {
        let name = required_name(record.package.as_ref(), "Package", || {
            format!("{group}[{idx}]")
        })?;
        if collector.skips_self(name) {
            continue;
        }
        collector.accept(name, resolve_record(name, record, &remotes));
    }
    Ok(collector.manifest)
}

pub fn extract_flattened(
    session: &FlatSession,
    flags: ExtractFlags,
    diag: &mut Diagnostics,
) -> Result<Manifest, CoreError> {
    let mut collector = Collector::new(flags, diag);
    for (idx, row) in session.packages.iter().enumerate() {
        if !row.attached && !flags.include_loaded_only {
            continue;
        }
        let name = required_name(row.package.as_ref(), "package", || {
            format!("packages[{idx}]")
        })?;
        if collector.skips_self(name) {
            continue;
        }
        let resolution = resolve_source_row(
            name,
            row.version.as_deref(),
            row.source.as_deref(),
            row.priority.as_deref(),
        );
        collector.accept(name, resolution);
    }
    Ok(collector.manifest)
}

pub fn extract_tabular(
    table: &TabularManifest,
    flags: ExtractFlags,
    diag: &mut Diagnostics,
) -> Result<Manifest, CoreError> {
    let mut collector = Collector::new(flags, diag);
    for (idx, row) in table.rows.iter().enumerate() {
        let name = required_name(row.name.as_ref(), "name", || format!("package[{idx}]"))?;
        if collector.skips_self(name) {
            continue;
        }
        let resolution =
            resolve_source_row(name, row.version.as_deref(), row.source.as_deref(), None);
        collector.accept(name, resolution);
    }
    Ok(collector.manifest)
}

/// Extract from either snapshot shape, keeping the snapshot and its R version.
pub fn extract_snapshot(
    snapshot: &SessionSnapshot,
    flags: ExtractFlags,
    diag: &mut Diagnostics,
) -> Result<Extraction, CoreError> {
    let manifest = match snapshot {
        SessionSnapshot::Structured(s) => extract_structured(s, flags, diag)?,
        SessionSnapshot::Flattened(s) => extract_flattened(s, flags, diag)?,
    };
    debug!(
        "extracted {} package(s) from R {} session",
        manifest.len(),
        snapshot.r_version()
    );
    Ok(Extraction {
        manifest,
        r_version: Some(snapshot.r_version().to_owned()).filter(|v| !v.trim().is_empty()),
        snapshot: Some(snapshot.clone()),
        ..Extraction::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use envcast_schema::{FlatPackageRow, Provenance, RawPackageRecord, TabularRow};

    fn cran(name: &str, version: &str) -> RawPackageRecord {
        let mut r = RawPackageRecord::named(name, version);
        r.repository = Some("CRAN".to_owned());
        r
    }

    fn structured(
        attached: Vec<RawPackageRecord>,
        loaded: Vec<RawPackageRecord>,
    ) -> StructuredSession {
        StructuredSession {
            r_version: "4.3.1".to_owned(),
            platform: None,
            base_packages: vec!["stats".to_owned()],
            attached,
            loaded_only: loaded,
        }
    }

    fn row(name: &str, version: &str, attached: bool, source: &str) -> FlatPackageRow {
        FlatPackageRow {
            package: Some(name.to_owned()),
            version: Some(version.to_owned()),
            attached,
            source: Some(source.to_owned()),
            priority: None,
        }
    }

    #[test]
    fn structured_skips_loaded_only_by_default() {
        let session = structured(vec![cran("fortunes", "1.5-4")], vec![cran("jsonlite", "1.8.7")]);
        let mut diag = Diagnostics::new();
        let manifest = extract_structured(&session, ExtractFlags::default(), &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["fortunes"]);

        let flags = ExtractFlags {
            include_loaded_only: true,
            ..ExtractFlags::default()
        };
        let manifest = extract_structured(&session, flags, &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["fortunes", "jsonlite"]);
        assert!(diag.is_empty());
    }

    #[test]
    fn structured_drops_self_package_unless_requested() {
        let session = structured(vec![cran(SELF_PACKAGE, "0.1.0"), cran("sf", "1.0")], vec![]);
        let mut diag = Diagnostics::new();
        let manifest = extract_structured(&session, ExtractFlags::default(), &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["sf"]);

        let flags = ExtractFlags {
            include_self: true,
            ..ExtractFlags::default()
        };
        let manifest = extract_structured(&session, flags, &mut diag).unwrap();
        assert!(manifest.contains(SELF_PACKAGE));
    }

    #[test]
    fn structured_reports_each_reject_once() {
        let session = structured(
            vec![RawPackageRecord::named("mystery", "1.0"), cran("sf", "1.0")],
            vec![],
        );
        let mut diag = Diagnostics::new();
        let manifest = extract_structured(&session, ExtractFlags::default(), &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["sf"]);
        assert_eq!(
            diag.warnings(),
            &[Warning::UnresolvableProvenance {
                package: "mystery".to_owned()
            }]
        );
    }

    #[test]
    fn structured_missing_name_is_fatal() {
        let nameless = RawPackageRecord {
            repository: Some("CRAN".to_owned()),
            ..RawPackageRecord::default()
        };
        let session = structured(vec![cran("sf", "1.0"), nameless], vec![]);
        let err = extract_structured(&session, ExtractFlags::default(), &mut Diagnostics::new())
            .unwrap_err();
        match err {
            CoreError::MissingRequiredField { field, record } => {
                assert_eq!(field, "Package");
                assert_eq!(record, "attached[1]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flattened_rewrites_github_version() {
        let session = FlatSession {
            r_version: "4.3.1".to_owned(),
            platform: None,
            packages: vec![
                row("tool", "0.0.1", true, "Github (alice/tool@v2)"),
                row("fortunes", "1.5-4", true, "CRAN (R 4.3.0)"),
                row("jsonlite", "1.8.7", false, "CRAN (R 4.3.0)"),
            ],
        };
        let mut diag = Diagnostics::new();
        let manifest = extract_flattened(&session, ExtractFlags::default(), &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["tool", "fortunes"]);
        let tool = manifest.iter().next().unwrap();
        assert_eq!(tool.provenance, Provenance::GitHub);
        assert_eq!(tool.version.as_deref(), Some("alice/tool@v2"));
    }

    #[test]
    fn tabular_rows_resolve_and_report() {
        let table = TabularManifest {
            rows: vec![
                TabularRow::new("sf", "1.0-14", "CRAN"),
                TabularRow::new("Biobase", "2.60.0", "bioconductor"),
                TabularRow::new("mine", "0.1", "local"),
                TabularRow::new("utils", "4.3.1", "CRAN"),
            ],
        };
        let mut diag = Diagnostics::new();
        let manifest = extract_tabular(&table, ExtractFlags::default(), &mut diag).unwrap();
        assert_eq!(manifest.names(), vec!["sf", "Biobase"]);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn tabular_missing_name_is_fatal() {
        let table = TabularManifest {
            rows: vec![TabularRow {
                name: None,
                version: Some("1.0".to_owned()),
                source: Some("CRAN".to_owned()),
            }],
        };
        let err = extract_tabular(&table, ExtractFlags::default(), &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingRequiredField { field: "name", .. }));
    }

    #[test]
    fn snapshot_extraction_keeps_r_version() {
        let snapshot = SessionSnapshot::Structured(structured(vec![cran("sf", "1.0")], vec![]));
        let extraction =
            extract_snapshot(&snapshot, ExtractFlags::default(), &mut Diagnostics::new()).unwrap();
        assert_eq!(extraction.r_version.as_deref(), Some("4.3.1"));
        assert!(extraction.snapshot.is_some());
        assert!(extraction.target_file.is_none());
    }
}
