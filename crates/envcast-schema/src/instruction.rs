//! Dockerfile instructions and their textual rendering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of a Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    From { image: String },
    Label { key: String, value: String },
    Env { key: String, value: String },
    /// Exec-form `RUN ["cmd", "arg"]`.
    Run { args: Vec<String> },
    /// Shell-form `RUN cmd && cmd`.
    Shell { command: String },
    Workdir { path: String },
    Copy { source: String, destination: String },
    Cmd { args: Vec<String> },
    Entrypoint { args: Vec<String> },
}

impl Instruction {
    pub fn run<S: AsRef<str>>(args: &[S]) -> Self {
        Self::Run {
            args: args.iter().map(|a| a.as_ref().to_owned()).collect(),
        }
    }

    pub fn copy(source: &str, destination: &str) -> Self {
        Self::Copy {
            source: source.to_owned(),
            destination: destination.to_owned(),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::From { .. } => "FROM",
            Self::Label { .. } => "LABEL",
            Self::Env { .. } => "ENV",
            Self::Run { .. } | Self::Shell { .. } => "RUN",
            Self::Workdir { .. } => "WORKDIR",
            Self::Copy { .. } => "COPY",
            Self::Cmd { .. } => "CMD",
            Self::Entrypoint { .. } => "ENTRYPOINT",
        }
    }
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

fn exec_form(args: &[String]) -> String {
    let parts: Vec<String> = args.iter().map(|a| quoted(a)).collect();
    format!("[{}]", parts.join(", "))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = self.keyword();
        match self {
            Self::From { image } => write!(f, "{kw} {image}"),
            Self::Label { key, value } | Self::Env { key, value } => {
                write!(f, "{kw} {key}={}", quoted(value))
            }
            Self::Run { args } | Self::Cmd { args } | Self::Entrypoint { args } => {
                write!(f, "{kw} {}", exec_form(args))
            }
            Self::Shell { command } => write!(f, "{kw} {command}"),
            Self::Workdir { path } => write!(f, "{kw} {path}"),
            Self::Copy {
                source,
                destination,
            } => write!(
                f,
                "{kw} {}",
                exec_form(&[source.clone(), destination.clone()])
            ),
        }
    }
}

/// A fully assembled, ordered instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dockerfile {
    pub instructions: Vec<Instruction>,
}

impl Dockerfile {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Index of the first instruction with the given keyword.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.instructions.iter().position(|i| i.keyword() == keyword)
    }

    /// Indices of every instruction with the given keyword.
    pub fn positions(&self, keyword: &str) -> Vec<usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.keyword() == keyword)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Dockerfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
