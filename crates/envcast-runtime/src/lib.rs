//! External collaborators of the envcast pipeline.
//!
//! This crate implements the services the pipeline talks to but does not own:
//! a `SessionExecutor` that runs scripts, documents or expressions in a clean R
//! process and returns a session snapshot, a `SystemRequirements` service that
//! maps R packages to system libraries (remote API or offline database), and a
//! `TagLister` that lists the tags of a base image on a registry. In-memory
//! implementations for tests live in `mock`.

pub mod executor;
pub mod mock;
pub mod registry;
pub mod sysreqs;

pub use executor::{RscriptExecutor, SessionExecutor};
pub use registry::{DockerHubTags, TagLister};
pub use sysreqs::{
    DatabaseEntry, HttpSysreqs, StaticSysreqs, SysreqsQuery, SystemPackage, SystemRequirements,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("execution failed: {0}")]
    ExecFailed(String),
    #[error("invalid session snapshot: {0}")]
    Snapshot(#[from] envcast_schema::SchemaError),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("registry unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("offline mode: {0}")]
    Offline(String),
}
