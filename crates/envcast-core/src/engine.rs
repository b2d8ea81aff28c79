use crate::assemble::{automatic_command, metadata_instructions, BuildTarget};
use crate::copy::CopyResolver;
use crate::diagnostics::{Diagnostics, Warning};
use crate::dispatch;
use crate::extract::TargetFile;
use crate::install::{build_install, default_platform, resolve_base_image, R_IMAGE_REPOSITORY};
use crate::CoreError;
use envcast_runtime::{SessionExecutor, SystemRequirements, TagLister};
use envcast_schema::{
    Dockerfile, GenerateOptions, ImageName, Instruction, Manifest, Platform, SessionSnapshot,
    SourceDescription,
};
use std::path::Path;
use tracing::{debug, info};

/// Entry point of the pipeline.
///
/// Holds the external collaborators; every call to [`Engine::generate`] is
/// independent and keeps no state between invocations.
pub struct Engine {
    executor: Box<dyn SessionExecutor>,
    sysreqs: Box<dyn SystemRequirements>,
    tags: Box<dyn TagLister>,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct GenerateResult {
    pub dockerfile: Dockerfile,
    /// Packages after extraction, before base image filtering.
    pub manifest: Manifest,
    pub base_image: ImageName,
    pub platform: Platform,
    pub target_file: Option<TargetFile>,
    pub snapshot: Option<SessionSnapshot>,
    pub warnings: Vec<Warning>,
}

impl Engine {
    pub fn new(
        executor: Box<dyn SessionExecutor>,
        sysreqs: Box<dyn SystemRequirements>,
        tags: Box<dyn TagLister>,
    ) -> Self {
        Self {
            executor,
            sysreqs,
            tags,
        }
    }

    /// Turn `source` into a Dockerfile. Copy paths are relative to `context`.
    pub fn generate(
        &self,
        source: &SourceDescription,
        context: &Path,
        options: &GenerateOptions,
    ) -> Result<GenerateResult, CoreError> {
        options.validate()?;
        let mut diag = Diagnostics::new();

        let extraction = dispatch::extract(source, self.executor.as_ref(), options, &mut diag)?;
        info!(
            "resolved {} package(s) from {} input",
            extraction.manifest.len(),
            source.kind()
        );

        let r_version = options.r_version.as_deref().or(extraction.r_version.as_deref());
        let base_image = resolve_base_image(options, r_version, self.tags.as_ref(), &mut diag)?;
        let platform = match options.platform {
            Some(ref explicit) => explicit.clone(),
            None if base_image.repository() == R_IMAGE_REPOSITORY => {
                default_platform(base_image.tag())
            }
            None => default_platform(r_version),
        };
        debug!("base image {base_image} on {platform}");

        let mut target = BuildTarget::new(base_image.clone());
        target.metadata = metadata_instructions(options);
        target.install = build_install(
            &extraction.manifest,
            &platform,
            self.sysreqs.as_ref(),
            options,
        )?;

        let (copies, target_rel) = {
            let mut resolver = CopyResolver::new(context, &mut diag);
            let copies = resolver.resolve(&options.copy, extraction.target_file.as_ref())?;
            let rel = extraction
                .target_file
                .as_ref()
                .map(|t| resolver.target_path(t));
            (copies, rel)
        };

        target.state_copy = options
            .save_state
            .as_ref()
            .map(|state| Instruction::copy(&state.file, &state.file));
        let needs_workdir =
            extraction.needs_workdir || !copies.is_empty() || target.state_copy.is_some();
        target.workdir = options.workdir.clone().filter(|_| needs_workdir);

        target.cmd = match options.cmd {
            Some(ref cmd) => cmd.clone(),
            None => {
                let packaged = extraction.target_file.as_ref().zip(target_rel.as_deref());
                automatic_command(packaged, &copies)
            }
        };
        target.copies = copies;
        target.entrypoint = options.entrypoint.clone();

        let dockerfile = target.assemble();
        info!(
            "generated {} instruction(s) with {} warning(s)",
            dockerfile.instructions.len(),
            diag.len()
        );

        Ok(GenerateResult {
            dockerfile,
            manifest: extraction.manifest,
            base_image,
            platform,
            target_file: extraction.target_file,
            snapshot: extraction.snapshot,
            warnings: diag.into_warnings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envcast_runtime::mock::{MockExecutor, MockSysreqs, MockTags};
    use envcast_schema::{CopySelector, FlatPackageRow, FlatSession, SaveState};
    use std::fs;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot::Flattened(FlatSession {
            r_version: "4.3.1".to_owned(),
            platform: None,
            packages: vec![
                FlatPackageRow {
                    package: Some("sf".to_owned()),
                    version: Some("1.0-14".to_owned()),
                    attached: true,
                    source: Some("CRAN (R 4.3.0)".to_owned()),
                    priority: None,
                },
                FlatPackageRow {
                    package: Some("tool".to_owned()),
                    version: Some("0.1".to_owned()),
                    attached: true,
                    source: Some("Github (alice/tool@v2)".to_owned()),
                    priority: None,
                },
            ],
        })
    }

    fn engine() -> Engine {
        Engine::new(
            Box::new(MockExecutor::new(snapshot())),
            Box::new(MockSysreqs::new().with("sf", &["libgdal-dev"])),
            Box::new(MockTags::new(&["4.3.1", "latest"])),
        )
    }

    #[test]
    fn absent_input_is_from_and_cmd_only() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine()
            .generate(
                &SourceDescription::Absent,
                dir.path(),
                &GenerateOptions::default(),
            )
            .unwrap();
        assert_eq!(
            result.dockerfile.render(),
            "FROM rocker/r-ver:latest\nCMD [\"R\"]\n"
        );
        assert_eq!(result.platform, Platform::new("ubuntu", "24.04"));
    }

    #[test]
    fn session_input_builds_install_steps() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine()
            .generate(
                &SourceDescription::Session(snapshot()),
                dir.path(),
                &GenerateOptions::default(),
            )
            .unwrap();
        let text = result.dockerfile.render();
        assert!(text.starts_with("FROM rocker/r-ver:4.3.1\n"));
        assert!(text.contains("apt-get install -y libgdal-dev"));
        assert!(text.contains(r#"RUN ["installGithub.r", "alice/tool@v2"]"#));
        assert!(result.dockerfile.position("WORKDIR").is_none());
        assert_eq!(result.platform, Platform::new("ubuntu", "22.04"));
    }

    #[test]
    fn script_with_copy_runs_packaged_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        let script = dir.path().join("sub/run.R");
        fs::write(&script, "library(sf)\n").unwrap();
        let options = GenerateOptions {
            copy: CopySelector::ScriptOnly,
            save_state: Some(SaveState::default()),
            ..GenerateOptions::default()
        };
        let result = engine()
            .generate(&SourceDescription::Path(script), dir.path(), &options)
            .unwrap();
        let df = &result.dockerfile;
        let workdir = df.position("WORKDIR").unwrap();
        let copies = df.positions("COPY");
        assert_eq!(copies.len(), 2);
        assert!(copies.iter().all(|c| *c > workdir));
        assert!(df.positions("RUN").iter().all(|r| *r < workdir));
        assert_eq!(
            df.instructions.last(),
            Some(&Instruction::Cmd {
                args: vec![
                    "R".to_owned(),
                    "--vanilla".to_owned(),
                    "-f".to_owned(),
                    "sub/run.R".to_owned()
                ],
            })
        );
    }

    #[test]
    fn disabled_workdir_is_never_emitted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.R"), "").unwrap();
        let options = GenerateOptions {
            workdir: None,
            copy: CopySelector::ScriptDirectory,
            ..GenerateOptions::default()
        };
        let source = SourceDescription::Path(dir.path().join("run.R"));
        let result = engine().generate(&source, dir.path(), &options).unwrap();
        assert!(result.dockerfile.position("WORKDIR").is_none());
        assert_eq!(result.dockerfile.positions("COPY").len(), 1);
    }

    #[test]
    fn invalid_options_are_rejected_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let options = GenerateOptions {
            workdir: Some("relative/".to_owned()),
            ..GenerateOptions::default()
        };
        let err = engine()
            .generate(&SourceDescription::Absent, dir.path(), &options)
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema(_)));
    }
}
