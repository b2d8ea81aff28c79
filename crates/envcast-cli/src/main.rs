mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_EXECUTION_ERROR, EXIT_FAILURE, EXIT_INPUT_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "envcast",
    version,
    about = "Generate Dockerfiles that reproduce R environments"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Path to the generation config (defaults to envcast.toml in the build context).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the environment description comes from. At most one may be given.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct SourceArgs {
    /// Script, document, DESCRIPTION file, snapshot JSON or project directory.
    pub input: Option<PathBuf>,
    /// R expression to evaluate in a clean session (repeatable).
    #[arg(long = "expr", short = 'e')]
    pub expressions: Vec<String>,
    /// Package table (TOML `[[package]]` rows or a JSON array).
    #[arg(long)]
    pub packages: Option<PathBuf>,
    /// Serialized session snapshot (JSON).
    #[arg(long)]
    pub session: Option<PathBuf>,
}

/// Command-line overrides for the generation config.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// Base image, replacing the R image derived from the session.
    #[arg(long)]
    pub image: Option<String>,
    /// R version used to pick the base image.
    #[arg(long)]
    pub r_version: Option<String>,
    /// Target platform as `distribution:release`.
    #[arg(long)]
    pub platform: Option<String>,
    /// Verify the base image tag exists on the registry.
    #[arg(long, default_value_t = false)]
    pub check_tag: bool,
    /// Keep envcast itself in the package list.
    #[arg(long, default_value_t = false)]
    pub include_self: bool,
    /// Also install packages that were loaded but not attached.
    #[arg(long, default_value_t = false)]
    pub loaded_only: bool,
    /// Install the exact package versions of the session.
    #[arg(long, default_value_t = false)]
    pub match_versions: bool,
    /// Skip packages listed as installed in the base image.
    #[arg(long, default_value_t = false)]
    pub filter_base_image: bool,
    /// Include system libraries needed only by optional features.
    #[arg(long, default_value_t = false)]
    pub soft: bool,
    /// Resolve system libraries from the offline database only.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
    /// Pin system library versions where known.
    #[arg(long, default_value_t = false)]
    pub match_library_versions: bool,
    /// Offline system requirements database (JSON).
    #[arg(long)]
    pub sysreqs_db: Option<PathBuf>,
    /// Copy mode: none, script or script_dir.
    #[arg(long)]
    pub copy: Option<String>,
    /// Path to copy into the image (repeatable, replaces --copy).
    #[arg(long = "copy-path")]
    pub copy_paths: Vec<PathBuf>,
    /// Working directory inside the image; must end with '/'.
    #[arg(long, conflicts_with = "no_workdir")]
    pub workdir: Option<String>,
    /// Do not set a working directory.
    #[arg(long, default_value_t = false)]
    pub no_workdir: bool,
    /// Maintainer label.
    #[arg(long)]
    pub maintainer: Option<String>,
    /// Environment variable as KEY=VALUE (repeatable).
    #[arg(long = "env")]
    pub env: Vec<String>,
    /// Startup command as a JSON array, e.g. '["R", "--vanilla"]'.
    #[arg(long)]
    pub cmd: Option<String>,
    /// Entrypoint as a JSON array.
    #[arg(long)]
    pub entrypoint: Option<String>,
    /// Copy a state file with the captured session into the image.
    #[arg(long, default_value_t = false)]
    pub save_state: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a Dockerfile from an environment description.
    Generate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        overrides: OverrideArgs,
        /// Build context for COPY paths (defaults to the input's directory).
        #[arg(long)]
        context: Option<PathBuf>,
        /// Write the Dockerfile here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Rscript binary used to execute scripts and documents.
        #[arg(long, default_value = "Rscript")]
        rscript: PathBuf,
    },
    /// Print the effective generation options after validation.
    Config {
        /// Build context whose envcast.toml is read when --config is absent.
        #[arg(long, default_value = ".")]
        context: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ENVCAST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Generate {
            source,
            overrides,
            context,
            output,
            rscript,
        } => commands::generate::run(
            &source,
            &overrides,
            config,
            context.as_deref(),
            output.as_deref(),
            &rscript,
            json_output,
        ),
        Commands::Config { context } => commands::config::run(config, &context, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("input error:") || msg.starts_with("config error:") {
                EXIT_INPUT_ERROR
            } else if msg.starts_with("execution error:") {
                EXIT_EXECUTION_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
