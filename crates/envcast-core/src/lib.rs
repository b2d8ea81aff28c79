//! Resolution and assembly pipeline for envcast.
//!
//! This crate turns a `SourceDescription` into a `Dockerfile`: the dispatcher
//! classifies the input and routes it to an extractor, extractors normalize raw
//! package records into a `Manifest` through the provenance resolver, the
//! install builder picks a base image and emits system and R package install
//! steps, the copy resolver computes context-relative `COPY` steps, and the
//! assembler merges everything in a fixed order. `Engine` is the entry point.

pub mod assemble;
pub mod copy;
pub mod diagnostics;
pub mod discover;
pub mod dispatch;
pub mod engine;
pub mod extract;
pub mod install;
pub mod project;
pub mod provenance;
pub mod source_field;

pub use assemble::BuildTarget;
pub use diagnostics::{Diagnostics, Warning};
pub use discover::FileKind;
pub use engine::{Engine, GenerateResult};
pub use extract::{Extraction, TargetFile, SELF_PACKAGE};

use envcast_runtime::RuntimeError;
use envcast_schema::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported input: {0}")]
    UnsupportedInputKind(String),
    #[error("package record {record} is missing required field '{field}'")]
    MissingRequiredField { field: &'static str, record: String },
    #[error("no R script or document found in {}", .0.display())]
    NoPackageableFileFound(PathBuf),
    #[error("copy mode '{0}' requires a packaged file, but the input selects none")]
    NoTargetFile(String),
    #[error("registry unreachable at {endpoint}: {reason}")]
    UnreachableRegistry { endpoint: String, reason: String },
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("runtime error: {0}")]
    Runtime(#[source] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RuntimeError> for CoreError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Unreachable { endpoint, reason } => {
                Self::UnreachableRegistry { endpoint, reason }
            }
            other => Self::Runtime(other),
        }
    }
}
