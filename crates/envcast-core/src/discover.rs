//! File kinds and packaged-file selection inside a project directory.

use crate::diagnostics::{Diagnostics, Warning};
use crate::CoreError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Script,
    /// Weaved document, rendered rather than sourced.
    Document,
    /// A session snapshot already serialized to JSON.
    Snapshot,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

impl FileKind {
    /// Classify by extension. Unknown extensions are treated as scripts.
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("rmd" | "rnw") => Self::Document,
            Some("json") => Self::Snapshot,
            _ => Self::Script,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Document => "document",
            Self::Snapshot => "snapshot",
        }
    }
}

/// Pick the one file to package from `dir`.
///
/// Candidates are listed recursively in lexicographic order. Documents win
/// over scripts; when several candidates remain, the first is used and a
/// warning is recorded.
pub fn select_file(dir: &Path, diag: &mut Diagnostics) -> Result<PathBuf, CoreError> {
    let mut scripts = Vec::new();
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        match extension_of(entry.path()).as_deref() {
            Some("r") => scripts.push(entry.into_path()),
            Some("rmd" | "rnw") => documents.push(entry.into_path()),
            _ => {}
        }
    }
    debug!(
        "found {} document(s) and {} script(s) in {}",
        documents.len(),
        scripts.len(),
        dir.display()
    );

    let (mut candidates, ignored_scripts) = match (documents.is_empty(), scripts.is_empty()) {
        (false, false) => (documents, scripts.len()),
        (false, true) => (documents, 0),
        (true, false) => (scripts, 0),
        (true, true) => return Err(CoreError::NoPackageableFileFound(dir.to_path_buf())),
    };
    let count = candidates.len();
    let selected = candidates.swap_remove(0);

    if ignored_scripts > 0 {
        diag.warn(Warning::IgnoredScripts {
            selected: selected.display().to_string(),
            ignored: ignored_scripts,
        });
    } else if count > 1 {
        diag.warn(Warning::MultipleCandidates {
            selected: selected.display().to_string(),
            count,
        });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn kind_by_extension_is_case_insensitive() {
        assert_eq!(FileKind::from_path(Path::new("a.R")), FileKind::Script);
        assert_eq!(FileKind::from_path(Path::new("a.r")), FileKind::Script);
        assert_eq!(FileKind::from_path(Path::new("a.RMD")), FileKind::Document);
        assert_eq!(FileKind::from_path(Path::new("a.Rnw")), FileKind::Document);
        assert_eq!(FileKind::from_path(Path::new("s.json")), FileKind::Snapshot);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), FileKind::Script);
    }

    #[test]
    fn document_wins_with_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.R");
        touch(dir.path(), "b.R");
        touch(dir.path(), "doc.Rmd");
        let mut diag = Diagnostics::new();
        let selected = select_file(dir.path(), &mut diag).unwrap();
        assert_eq!(selected, dir.path().join("doc.Rmd"));
        assert_eq!(diag.len(), 1);
        assert!(matches!(
            diag.warnings()[0],
            Warning::IgnoredScripts { ignored: 2, .. }
        ));
    }

    #[test]
    fn first_script_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "zeta.R");
        touch(dir.path(), "alpha.R");
        touch(dir.path(), "notes.txt");
        let mut diag = Diagnostics::new();
        let selected = select_file(dir.path(), &mut diag).unwrap();
        assert_eq!(selected, dir.path().join("alpha.R"));
        assert!(matches!(
            diag.warnings()[0],
            Warning::MultipleCandidates { count: 2, .. }
        ));
    }

    #[test]
    fn single_nested_script_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "sub/run.R");
        let mut diag = Diagnostics::new();
        let selected = select_file(dir.path(), &mut diag).unwrap();
        assert_eq!(selected, dir.path().join("sub").join("run.R"));
        assert!(diag.is_empty());
    }

    #[test]
    fn empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        let err = select_file(dir.path(), &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, CoreError::NoPackageableFileFound(_)));
    }
}
