use crate::description::ProjectManifest;
use crate::record::{SessionSnapshot, TabularManifest};
use std::path::PathBuf;

/// The environment description handed to the pipeline. Exactly one shape per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescription {
    /// No information; produces no install instructions.
    Absent,
    /// R expressions to evaluate in a clean session.
    Expression(Vec<String>),
    Tabular(TabularManifest),
    Session(SessionSnapshot),
    Project(ProjectManifest),
    /// A file or directory on disk; classified further by the dispatcher.
    Path(PathBuf),
}

impl SourceDescription {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Expression(_) => "expression",
            Self::Tabular(_) => "tabular manifest",
            Self::Session(SessionSnapshot::Structured(_)) => "structured session",
            Self::Session(SessionSnapshot::Flattened(_)) => "flattened session",
            Self::Project(_) => "project manifest",
            Self::Path(_) => "path",
        }
    }
}
