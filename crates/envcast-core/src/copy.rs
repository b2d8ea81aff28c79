//! Build-context relative `COPY` steps.
//!
//! Paths are rendered with forward slashes whatever the host convention.
//! Directories carry a trailing `/`, and the context itself is `./`.

use crate::diagnostics::{Diagnostics, Warning};
use crate::extract::TargetFile;
use crate::CoreError;
use envcast_schema::{CopySelector, Instruction};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn component_str(c: Component<'_>) -> String {
    c.as_os_str().to_string_lossy().into_owned()
}

/// POSIX path of `path` relative to `context`. Both must be canonical.
/// Paths outside the context climb out with `..`.
pub fn relative_posix(path: &Path, context: &Path) -> String {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let context_parts: Vec<Component<'_>> = context.components().collect();
    let common = path_parts
        .iter()
        .zip(&context_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = context_parts[common..]
        .iter()
        .map(|_| "..".to_owned())
        .collect();
    parts.extend(path_parts[common..].iter().map(|c| component_str(*c)));
    let joined = parts.join("/");

    match (joined.is_empty(), path.is_dir()) {
        (true, _) => "./".to_owned(),
        (false, true) => format!("{joined}/"),
        (false, false) => joined,
    }
}

/// Resolves copy sources against one build context.
pub struct CopyResolver<'a> {
    context: PathBuf,
    diag: &'a mut Diagnostics,
}

impl<'a> CopyResolver<'a> {
    pub fn new(context: &Path, diag: &'a mut Diagnostics) -> Self {
        Self {
            context: canonical(context),
            diag,
        }
    }

    fn relative(&mut self, path: &Path) -> String {
        let path = canonical(path);
        if !path.starts_with(&self.context) {
            self.diag.warn(Warning::ContextEscape {
                path: path.display().to_string(),
                context: self.context.display().to_string(),
            });
        }
        relative_posix(&path, &self.context)
    }

    fn same_place(&mut self, path: &Path) -> Instruction {
        let rel = self.relative(path);
        debug!("copying {rel}");
        Instruction::copy(&rel, &rel)
    }

    /// Copy steps for `selector`, in selector order.
    pub fn resolve(
        &mut self,
        selector: &CopySelector,
        target: Option<&TargetFile>,
    ) -> Result<Vec<Instruction>, CoreError> {
        match selector {
            CopySelector::None => Ok(Vec::new()),
            CopySelector::ScriptOnly => {
                let target = target.ok_or_else(|| CoreError::NoTargetFile("script".to_owned()))?;
                Ok(vec![self.same_place(&target.path)])
            }
            CopySelector::ScriptDirectory => {
                let target =
                    target.ok_or_else(|| CoreError::NoTargetFile("script_dir".to_owned()))?;
                let canonical_target = canonical(&target.path);
                let dir = canonical_target
                    .parent()
                    .unwrap_or(self.context.as_path())
                    .to_path_buf();
                Ok(vec![self.same_place(&dir)])
            }
            CopySelector::Paths(paths) => {
                let mut steps = Vec::with_capacity(paths.len());
                for path in paths {
                    let full = if path.is_absolute() {
                        path.clone()
                    } else {
                        self.context.join(path)
                    };
                    if !full.exists() {
                        self.diag.warn(Warning::MissingCopyTarget {
                            path: path.display().to_string(),
                        });
                        continue;
                    }
                    steps.push(self.same_place(&full));
                }
                Ok(steps)
            }
        }
    }

    /// Context-relative path of the packaged file, for startup commands.
    pub fn target_path(&self, target: &TargetFile) -> String {
        relative_posix(&canonical(&target.path), &self.context)
    }

    /// The resolved context directory.
    pub fn context(&self) -> &Path {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::FileKind;
    use std::fs;

    fn script(path: PathBuf) -> TargetFile {
        TargetFile {
            path,
            kind: FileKind::Script,
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/run.R"), "1\n").unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        dir
    }

    #[test]
    fn script_only_copies_relative_file() {
        let dir = project();
        let mut diag = Diagnostics::new();
        let target = script(dir.path().join("sub").join("run.R"));
        let steps = CopyResolver::new(dir.path(), &mut diag)
            .resolve(&CopySelector::ScriptOnly, Some(&target))
            .unwrap();
        assert_eq!(steps, vec![Instruction::copy("sub/run.R", "sub/run.R")]);
        assert!(diag.is_empty());
    }

    #[test]
    fn script_only_without_target_fails() {
        let dir = project();
        let mut diag = Diagnostics::new();
        let err = CopyResolver::new(dir.path(), &mut diag)
            .resolve(&CopySelector::ScriptOnly, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::NoTargetFile(_)));
    }

    #[test]
    fn script_directory_copies_parent() {
        let dir = project();
        let mut diag = Diagnostics::new();
        let mut resolver = CopyResolver::new(dir.path(), &mut diag);
        let nested = script(dir.path().join("sub/run.R"));
        assert_eq!(
            resolver
                .resolve(&CopySelector::ScriptDirectory, Some(&nested))
                .unwrap(),
            vec![Instruction::copy("sub/", "sub/")]
        );

        fs::write(dir.path().join("top.R"), "").unwrap();
        let top = script(dir.path().join("top.R"));
        assert_eq!(
            resolver
                .resolve(&CopySelector::ScriptDirectory, Some(&top))
                .unwrap(),
            vec![Instruction::copy("./", "./")]
        );
    }

    #[test]
    fn explicit_paths_skip_missing_with_one_warning() {
        let dir = project();
        let mut diag = Diagnostics::new();
        let selector = CopySelector::Paths(vec![PathBuf::from("data"), PathBuf::from("gone.csv")]);
        let steps = CopyResolver::new(dir.path(), &mut diag)
            .resolve(&selector, None)
            .unwrap();
        assert_eq!(steps, vec![Instruction::copy("data/", "data/")]);
        assert_eq!(
            diag.warnings(),
            &[Warning::MissingCopyTarget {
                path: "gone.csv".to_owned()
            }]
        );
    }

    #[test]
    fn file_outside_context_warns_and_climbs() {
        let outer = project();
        let context = outer.path().join("data");
        let mut diag = Diagnostics::new();
        let target = script(outer.path().join("sub/run.R"));
        let steps = CopyResolver::new(&context, &mut diag)
            .resolve(&CopySelector::ScriptOnly, Some(&target))
            .unwrap();
        assert_eq!(steps, vec![Instruction::copy("../sub/run.R", "../sub/run.R")]);
        assert!(matches!(diag.warnings()[0], Warning::ContextEscape { .. }));
    }

    #[test]
    fn none_copies_nothing() {
        let dir = project();
        let mut diag = Diagnostics::new();
        let steps = CopyResolver::new(dir.path(), &mut diag)
            .resolve(&CopySelector::None, None)
            .unwrap();
        assert!(steps.is_empty());
    }

    #[test]
    fn relative_posix_of_plain_paths() {
        assert_eq!(
            relative_posix(Path::new("/work/sub/run.R"), Path::new("/work")),
            "sub/run.R"
        );
        assert_eq!(relative_posix(Path::new("/work"), Path::new("/work")), "./");
        assert_eq!(
            relative_posix(Path::new("/other/x.R"), Path::new("/work")),
            "../other/x.R"
        );
    }
}
