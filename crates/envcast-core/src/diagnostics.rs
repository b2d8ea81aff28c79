use serde::Serialize;
use std::fmt;
use tracing::warn;

/// A non-fatal condition. The affected item is left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    UnresolvableProvenance { package: String },
    UnsupportedRemoteKind { remote: String },
    MissingCopyTarget { path: String },
    ContextEscape { path: String, context: String },
    IgnoredScripts { selected: String, ignored: usize },
    MultipleCandidates { selected: String, count: usize },
    MissingImageTag { image: String, fallback: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvableProvenance { package } => write!(
                f,
                "cannot determine where to install package '{package}' from, skipping it"
            ),
            Self::UnsupportedRemoteKind { remote } => {
                write!(f, "unsupported remote '{remote}', only GitHub remotes are installed")
            }
            Self::MissingCopyTarget { path } => {
                write!(f, "copy target '{path}' does not exist, skipping it")
            }
            Self::ContextEscape { path, context } => write!(
                f,
                "'{path}' is outside the build context '{context}', COPY instructions may be incorrect"
            ),
            Self::IgnoredScripts { selected, ignored } => write!(
                f,
                "found documents and {ignored} script(s), packaging '{selected}' and ignoring the scripts"
            ),
            Self::MultipleCandidates { selected, count } => {
                write!(f, "found {count} candidate files, packaging '{selected}'")
            }
            Self::MissingImageTag { image, fallback } => {
                write!(f, "image '{image}' is not published, using '{fallback}'")
            }
        }
    }
}

/// Warnings collected during one pipeline run. Each is logged once when added.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
