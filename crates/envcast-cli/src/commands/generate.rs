use super::{
    describe_error, effective_options, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS,
};
use crate::{OverrideArgs, SourceArgs};
use console::Style;
use envcast_core::{Engine, GenerateResult};
use envcast_runtime::{
    DockerHubTags, HttpSysreqs, RscriptExecutor, StaticSysreqs, SystemRequirements,
};
use envcast_schema::{
    GenerateOptions, Manifest, SaveState, SessionSnapshot, SourceDescription, TabularManifest,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents of the state file copied into the image.
#[derive(Debug, Serialize)]
struct StateFile<'a> {
    items: &'a [String],
    base_image: &'a str,
    packages: &'a Manifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a SessionSnapshot>,
}

fn source_description(source: &SourceArgs) -> Result<SourceDescription, String> {
    if let Some(ref path) = source.input {
        return Ok(SourceDescription::Path(path.clone()));
    }
    if !source.expressions.is_empty() {
        return Ok(SourceDescription::Expression(source.expressions.clone()));
    }
    if let Some(ref path) = source.packages {
        let table = TabularManifest::from_file(path)
            .map_err(|e| format!("input error: {}: {e}", path.display()))?;
        return Ok(SourceDescription::Tabular(table));
    }
    if let Some(ref path) = source.session {
        let snapshot = SessionSnapshot::from_file(path)
            .map_err(|e| format!("input error: {}: {e}", path.display()))?;
        return Ok(SourceDescription::Session(snapshot));
    }
    Ok(SourceDescription::Absent)
}

/// The build context: explicit, else the input directory (or the input file's
/// parent), else the current directory.
fn build_context(explicit: Option<&Path>, source: &SourceArgs) -> PathBuf {
    if let Some(context) = explicit {
        return context.to_path_buf();
    }
    match source.input {
        Some(ref input) if input.is_dir() => input.clone(),
        Some(ref input) => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        None => PathBuf::from("."),
    }
}

fn sysreqs_backend(options: &GenerateOptions) -> Result<Box<dyn SystemRequirements>, String> {
    if let Some(ref db) = options.sysreqs_database {
        debug!("using offline sysreqs database {}", db.display());
        let database = StaticSysreqs::load(db)
            .map_err(|e| format!("config error: sysreqs database {}: {e}", db.display()))?;
        return Ok(Box::new(database));
    }
    Ok(match options.sysreqs_api {
        Some(ref api) => Box::new(HttpSysreqs::new(api)),
        None => Box::new(HttpSysreqs::default()),
    })
}

fn write_state_file(
    context: &Path,
    state: &SaveState,
    result: &GenerateResult,
) -> Result<PathBuf, String> {
    let contents = StateFile {
        items: &state.items,
        base_image: result.base_image.as_str(),
        packages: &result.manifest,
        session: result.snapshot.as_ref(),
    };
    let path = context.join(&state.file);
    let json = json_pretty(&contents)?;
    std::fs::write(&path, json + "\n")
        .map_err(|e| format!("execution error: writing {}: {e}", path.display()))?;
    info!("wrote state file {}", path.display());
    Ok(path)
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    source: &SourceArgs,
    overrides: &OverrideArgs,
    config: Option<&Path>,
    context: Option<&Path>,
    output: Option<&Path>,
    rscript: &Path,
    json: bool,
) -> Result<u8, String> {
    let context = build_context(context, source);
    let options = effective_options(config, &context, overrides)?;
    let description = source_description(source)?;
    debug!(
        "generating from {} input, context {}",
        description.kind(),
        context.display()
    );

    let engine = Engine::new(
        Box::new(RscriptExecutor::with_binary(rscript)),
        sysreqs_backend(&options)?,
        Box::new(DockerHubTags::default()),
    );

    let pb = if json {
        None
    } else {
        Some(spinner("resolving R environment..."))
    };
    let result = match engine.generate(&description, &context, &options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "environment resolved");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "generation failed");
            }
            return Err(describe_error(&e));
        }
    };

    let state_path = match options.save_state {
        Some(ref state) => Some(write_state_file(&context, state, &result)?),
        None => None,
    };

    let dockerfile = result.dockerfile.render();
    if let Some(path) = output {
        std::fs::write(path, &dockerfile)
            .map_err(|e| format!("execution error: writing {}: {e}", path.display()))?;
    }

    if json {
        let payload = serde_json::json!({
            "dockerfile": dockerfile,
            "digest": blake3::hash(dockerfile.as_bytes()).to_hex().to_string(),
            "base_image": result.base_image,
            "platform": result.platform.to_string(),
            "packages": result.manifest,
            "target_file": result.target_file.as_ref().map(|t| t.path.display().to_string()),
            "state_file": state_path.as_ref().map(|p| p.display().to_string()),
            "warnings": result.warnings,
            "output": output.map(|p| p.display().to_string()),
        });
        println!("{}", json_pretty(&payload)?);
    } else if let Some(path) = output {
        let ok = Style::new().green();
        eprintln!(
            "{} {} ({} packages, {} warnings)",
            ok.apply_to("wrote"),
            path.display(),
            result.manifest.len(),
            result.warnings.len()
        );
    } else {
        print!("{dockerfile}");
    }
    Ok(EXIT_SUCCESS)
}
