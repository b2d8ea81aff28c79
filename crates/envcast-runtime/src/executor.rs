use crate::RuntimeError;
use envcast_schema::SessionSnapshot;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Runs R code in a fresh process and reports which packages it left loaded.
pub trait SessionExecutor {
    /// Source an R script.
    fn run_script(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError>;

    /// Render a weaved document (`.Rmd` via rmarkdown, `.Rnw` via knitr).
    fn render_document(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError>;

    /// Evaluate expressions in order.
    fn evaluate(&self, expressions: &[String]) -> Result<SessionSnapshot, RuntimeError>;
}

/// Environment variable through which the R side learns where to write the snapshot.
const SNAPSHOT_ENV: &str = "ENVCAST_SNAPSHOT";

/// Collects the structured session record as JSON. Requires `jsonlite`.
const CAPTURE_SESSION: &str = r#"local({
  si <- utils::sessionInfo()
  fields <- c("Package", "Version", "Priority", "Repository", "RemoteType",
              "GithubUsername", "GithubRepo", "GithubRef", "GithubSHA1",
              "RemoteUsername", "RemoteRepo", "RemoteRef", "RemoteSha", "biocViews")
  rec <- function(d) {
    d <- unclass(d)
    lapply(d[intersect(fields, names(d))], jsonlite::unbox)
  }
  out <- list(
    r_version = jsonlite::unbox(paste(si$R.version$major, si$R.version$minor, sep = ".")),
    platform = jsonlite::unbox(si$platform),
    base_packages = si$basePkgs,
    attached = unname(lapply(si$otherPkgs, rec)),
    loaded_only = unname(lapply(si$loadedOnly, rec))
  )
  writeLines(jsonlite::toJSON(out, null = "null"), Sys.getenv("ENVCAST_SNAPSHOT"))
})"#;

/// R string literal for an arbitrary value.
fn r_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// [`SessionExecutor`] backed by `Rscript --vanilla`.
pub struct RscriptExecutor {
    rscript: PathBuf,
}

impl Default for RscriptExecutor {
    fn default() -> Self {
        Self {
            rscript: PathBuf::from("Rscript"),
        }
    }
}

impl RscriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(rscript: impl Into<PathBuf>) -> Self {
        Self {
            rscript: rscript.into(),
        }
    }

    fn capture(&self, body: &str, cwd: Option<&Path>) -> Result<SessionSnapshot, RuntimeError> {
        let out = tempfile::NamedTempFile::new()?;
        let program = format!("{body}\n{CAPTURE_SESSION}\n");
        debug!(
            "running {} with {} bytes of R code",
            self.rscript.display(),
            program.len()
        );

        let mut cmd = Command::new(&self.rscript);
        cmd.args(["--vanilla", "-e", &program])
            .env(SNAPSHOT_ENV, out.path());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|e| {
            RuntimeError::ExecFailed(format!(
                "{} not found or failed to start: {e}",
                self.rscript.display()
            ))
        })?;

        if !output.status.success() {
            return Err(RuntimeError::ExecFailed(format!(
                "R exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(SessionSnapshot::from_file(out.path())?)
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

impl SessionExecutor for RscriptExecutor {
    fn run_script(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError> {
        info!("executing script {}", path.display());
        let abs = std::fs::canonicalize(path)?;
        let body = format!(
            "source({}, echo = FALSE, chdir = TRUE)",
            r_string(&abs.to_string_lossy())
        );
        self.capture(&body, parent_dir(&abs))
    }

    fn render_document(&self, path: &Path) -> Result<SessionSnapshot, RuntimeError> {
        info!("rendering document {}", path.display());
        let abs = std::fs::canonicalize(path)?;
        let quoted = r_string(&abs.to_string_lossy());
        let is_rnw = abs
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("rnw"));
        let body = if is_rnw {
            format!(
                "knitr::knit({quoted}, output = tempfile(fileext = \".tex\"), envir = globalenv())"
            )
        } else {
            format!(
                "rmarkdown::render({quoted}, output_dir = tempdir(), envir = globalenv())"
            )
        };
        self.capture(&body, parent_dir(&abs))
    }

    fn evaluate(&self, expressions: &[String]) -> Result<SessionSnapshot, RuntimeError> {
        info!("evaluating {} expression(s)", expressions.len());
        let body = expressions
            .iter()
            .map(|e| format!("eval(parse(text = {}), envir = globalenv())", r_string(e)))
            .collect::<Vec<_>>()
            .join("\n");
        self.capture(&body, None)
    }
}
