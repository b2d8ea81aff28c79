pub mod completions;
pub mod config;
pub mod generate;

use crate::OverrideArgs;
use envcast_core::CoreError;
use envcast_schema::{
    parse_config_file, ConfigV1, CopySelector, GenerateOptions, ImageName, SaveState, SchemaError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INPUT_ERROR: u8 = 2;
pub const EXIT_EXECUTION_ERROR: u8 = 3;

/// Config file looked up in the build context when `--config` is absent.
pub const CONFIG_FILE: &str = "envcast.toml";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Prefix an error so `main` can pick the exit code.
pub fn describe_error(err: &CoreError) -> String {
    match err {
        CoreError::UnsupportedInputKind(_)
        | CoreError::MissingRequiredField { .. }
        | CoreError::NoPackageableFileFound(_)
        | CoreError::NoTargetFile(_)
        | CoreError::Schema(_) => format!("input error: {err}"),
        CoreError::UnreachableRegistry { .. } | CoreError::Runtime(_) | CoreError::Io(_) => {
            format!("execution error: {err}")
        }
    }
}

fn config_error(err: &SchemaError) -> String {
    format!("config error: {err}")
}

/// Read the config (explicit path, or `envcast.toml` in `context` if present).
pub fn load_config(explicit: Option<&Path>, context: &Path) -> Result<ConfigV1, String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = context.join(CONFIG_FILE);
            if !candidate.is_file() {
                debug!("no {CONFIG_FILE} in {}, using defaults", context.display());
                return Ok(ConfigV1 {
                    config_version: 1,
                    ..ConfigV1::default()
                });
            }
            candidate
        }
    };
    debug!("reading config {}", path.display());
    parse_config_file(&path).map_err(|e| format!("config error: {}: {e}", path.display()))
}

fn parse_command(field: &str, value: &str) -> Result<Vec<String>, String> {
    serde_json::from_str(value)
        .map_err(|e| format!("config error: --{field} must be a JSON array of strings: {e}"))
}

/// Apply command-line overrides on top of the normalized config.
pub fn apply_overrides(
    mut options: GenerateOptions,
    overrides: &OverrideArgs,
) -> Result<GenerateOptions, String> {
    if let Some(ref image) = overrides.image {
        options.base_image = Some(ImageName::new(image.trim()));
    }
    if let Some(ref version) = overrides.r_version {
        options.r_version = Some(version.trim().to_owned());
    }
    if let Some(ref platform) = overrides.platform {
        options.platform = Some(platform.parse().map_err(|e| config_error(&e))?);
    }
    options.check_image_tag |= overrides.check_tag;
    options.include_self |= overrides.include_self;
    options.include_loaded_only |= overrides.loaded_only;
    options.match_package_versions |= overrides.match_versions;
    options.filter_base_image |= overrides.filter_base_image;
    options.soft_dependencies |= overrides.soft;
    options.offline |= overrides.offline;
    options.match_library_versions |= overrides.match_library_versions;
    if let Some(ref db) = overrides.sysreqs_db {
        options.sysreqs_database = Some(db.clone());
    }

    if !overrides.copy_paths.is_empty() {
        options.copy = CopySelector::Paths(overrides.copy_paths.clone());
    } else if let Some(ref mode) = overrides.copy {
        options.copy = mode.parse().map_err(|e| config_error(&e))?;
    }
    if overrides.no_workdir {
        options.workdir = None;
    } else if let Some(ref workdir) = overrides.workdir {
        options.workdir = Some(workdir.trim().to_owned());
    }
    if let Some(ref maintainer) = overrides.maintainer {
        options.maintainer = Some(maintainer.clone());
    }
    for pair in &overrides.env {
        let (key, value) = pair
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| format!("config error: --env expects KEY=VALUE, got '{pair}'"))?;
        options.env.insert(key.trim().to_owned(), value.to_owned());
    }
    if let Some(ref cmd) = overrides.cmd {
        options.cmd = Some(parse_command("cmd", cmd)?);
    }
    if let Some(ref entrypoint) = overrides.entrypoint {
        options.entrypoint = Some(parse_command("entrypoint", entrypoint)?);
    }
    if overrides.save_state && options.save_state.is_none() {
        options.save_state = Some(SaveState::default());
    }

    options.validate().map_err(|e| config_error(&e))?;
    Ok(options)
}

/// Config plus overrides, validated.
pub fn effective_options(
    explicit: Option<&Path>,
    context: &Path,
    overrides: &OverrideArgs,
) -> Result<GenerateOptions, String> {
    let config = load_config(explicit, context)?;
    let options = config.normalize().map_err(|e| config_error(&e))?;
    apply_overrides(options, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envcast_runtime::RuntimeError;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"dockerfile": "FROM x\n"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"dockerfile\""));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_INPUT_ERROR);
        assert_ne!(EXIT_INPUT_ERROR, EXIT_EXECUTION_ERROR);
    }

    #[test]
    fn errors_are_classified_by_prefix() {
        let input = describe_error(&CoreError::UnsupportedInputKind("x".to_owned()));
        assert!(input.starts_with("input error:"));
        let exec = describe_error(&CoreError::Runtime(RuntimeError::ExecFailed(
            "R exited".to_owned(),
        )));
        assert!(exec.starts_with("execution error:"));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = effective_options(None, dir.path(), &OverrideArgs::default()).unwrap();
        assert_eq!(options, GenerateOptions::default());
    }

    #[test]
    fn overrides_win_over_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "config_version = 1\n[layout]\nworkdir = \"/srv/\"\ncopy = \"script\"\n",
        )
        .unwrap();
        let overrides = OverrideArgs {
            no_workdir: true,
            copy_paths: vec!["data".into()],
            env: vec!["LANG=C.UTF-8".to_owned()],
            cmd: Some(r#"["Rscript", "main.R"]"#.to_owned()),
            ..OverrideArgs::default()
        };
        let options = effective_options(None, dir.path(), &overrides).unwrap();
        assert!(options.workdir.is_none());
        assert_eq!(options.copy, CopySelector::Paths(vec!["data".into()]));
        assert_eq!(options.env.get("LANG").map(String::as_str), Some("C.UTF-8"));
        assert_eq!(
            options.cmd,
            Some(vec!["Rscript".to_owned(), "main.R".to_owned()])
        );
    }

    #[test]
    fn malformed_overrides_are_config_errors() {
        let bad_env = OverrideArgs {
            env: vec!["NOVALUE".to_owned()],
            ..OverrideArgs::default()
        };
        let err = apply_overrides(GenerateOptions::default(), &bad_env).unwrap_err();
        assert!(err.starts_with("config error:"));

        let bad_workdir = OverrideArgs {
            workdir: Some("/payload".to_owned()),
            ..OverrideArgs::default()
        };
        let err = apply_overrides(GenerateOptions::default(), &bad_workdir).unwrap_err();
        assert!(err.contains("invalid workdir"));
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("generating...");
        spin_ok(&pb, "done");
    }
}
