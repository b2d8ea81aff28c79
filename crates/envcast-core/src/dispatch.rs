//! Input classification and extractor routing.

use crate::diagnostics::Diagnostics;
use crate::discover::{select_file, FileKind};
use crate::extract::{extract_snapshot, extract_tabular, ExtractFlags, Extraction, TargetFile};
use crate::project::extract_project;
use crate::CoreError;
use envcast_runtime::SessionExecutor;
use envcast_schema::{
    parse_description_file, GenerateOptions, SessionSnapshot, SourceDescription, DESCRIPTION_FILE,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a path-shaped input turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathInput {
    Directory(PathBuf),
    ProjectManifest(PathBuf),
    File(PathBuf, FileKind),
}

/// Classify a path by probing the file system. Missing paths are unsupported.
pub fn classify_path(path: &Path) -> Result<PathInput, CoreError> {
    if path.is_dir() {
        return Ok(PathInput::Directory(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(CoreError::UnsupportedInputKind(format!(
            "'{}' is neither an existing file nor a directory",
            path.display()
        )));
    }
    if path.file_name().is_some_and(|n| n == DESCRIPTION_FILE) {
        return Ok(PathInput::ProjectManifest(path.to_path_buf()));
    }
    Ok(PathInput::File(path.to_path_buf(), FileKind::from_path(path)))
}

/// Route `source` to its extractor.
pub fn extract(
    source: &SourceDescription,
    executor: &dyn SessionExecutor,
    options: &GenerateOptions,
    diag: &mut Diagnostics,
) -> Result<Extraction, CoreError> {
    let flags = ExtractFlags::from(options);
    debug!("classified input as {}", source.kind());

    match source {
        SourceDescription::Absent => Ok(Extraction::default()),
        SourceDescription::Expression(expressions) => {
            info!("evaluating {} expression(s) in a clean session", expressions.len());
            let snapshot = executor.evaluate(expressions)?;
            extract_snapshot(&snapshot, flags, diag)
        }
        SourceDescription::Tabular(table) => Ok(Extraction {
            manifest: extract_tabular(table, flags, diag)?,
            ..Extraction::default()
        }),
        SourceDescription::Session(snapshot) => extract_snapshot(snapshot, flags, diag),
        SourceDescription::Project(project) => extract_project(project, diag),
        SourceDescription::Path(path) => {
            let mut extraction = match classify_path(path)? {
                PathInput::Directory(dir) => {
                    let selected = select_file(&dir, diag)?;
                    info!("packaging {}", selected.display());
                    let kind = FileKind::from_path(&selected);
                    extract_file(&selected, kind, executor, flags, diag)?
                }
                PathInput::ProjectManifest(file) => {
                    let project = parse_description_file(&file)?;
                    extract_project(&project, diag)?
                }
                PathInput::File(file, kind) => extract_file(&file, kind, executor, flags, diag)?,
            };
            extraction.needs_workdir = true;
            Ok(extraction)
        }
    }
}

/// Obtain a snapshot for a single file, by executing it or reading it.
fn extract_file(
    path: &Path,
    kind: FileKind,
    executor: &dyn SessionExecutor,
    flags: ExtractFlags,
    diag: &mut Diagnostics,
) -> Result<Extraction, CoreError> {
    let snapshot = match kind {
        FileKind::Snapshot => {
            debug!("reading serialized snapshot {}", path.display());
            let snapshot = SessionSnapshot::from_file(path)?;
            return extract_snapshot(&snapshot, flags, diag);
        }
        FileKind::Script => executor.run_script(path)?,
        FileKind::Document => executor.render_document(path)?,
    };
    let mut extraction = extract_snapshot(&snapshot, flags, diag)?;
    extraction.target_file = Some(TargetFile {
        path: path.to_path_buf(),
        kind,
    });
    Ok(extraction)
}
