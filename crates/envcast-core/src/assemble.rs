//! Final instruction ordering.

use crate::discover::FileKind;
use crate::extract::TargetFile;
use envcast_schema::{Dockerfile, GenerateOptions, ImageName, Instruction};

/// The Dockerfile under construction, one slot per instruction group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub base_image: ImageName,
    pub metadata: Vec<Instruction>,
    pub install: Vec<Instruction>,
    pub workdir: Option<String>,
    pub copies: Vec<Instruction>,
    /// Serialized state file, copied after the payload.
    pub state_copy: Option<Instruction>,
    pub entrypoint: Option<Vec<String>>,
    pub cmd: Vec<String>,
}

impl BuildTarget {
    pub fn new(base_image: ImageName) -> Self {
        Self {
            base_image,
            metadata: Vec::new(),
            install: Vec::new(),
            workdir: None,
            copies: Vec::new(),
            state_copy: None,
            entrypoint: None,
            cmd: vec!["R".to_owned()],
        }
    }

    /// Merge every group in the fixed order: base image, metadata, install,
    /// working directory, copies, state copy, entrypoint, command.
    pub fn assemble(self) -> Dockerfile {
        let mut instructions = Vec::with_capacity(
            4 + self.metadata.len() + self.install.len() + self.copies.len(),
        );
        instructions.push(Instruction::From {
            image: self.base_image.into_inner(),
        });
        instructions.extend(self.metadata);
        instructions.extend(self.install);
        if let Some(path) = self.workdir {
            instructions.push(Instruction::Workdir { path });
        }
        instructions.extend(self.copies);
        instructions.extend(self.state_copy);
        if let Some(args) = self.entrypoint {
            instructions.push(Instruction::Entrypoint { args });
        }
        instructions.push(Instruction::Cmd { args: self.cmd });
        Dockerfile::new(instructions)
    }
}

/// Maintainer label and environment variables, variables sorted by name.
pub fn metadata_instructions(options: &GenerateOptions) -> Vec<Instruction> {
    let label = options.maintainer.iter().map(|m| Instruction::Label {
        key: "maintainer".to_owned(),
        value: m.clone(),
    });
    let env = options.env.iter().map(|(key, value)| Instruction::Env {
        key: key.clone(),
        value: value.clone(),
    });
    label.chain(env).collect()
}

/// Whether some copy step places `rel` in the image.
pub fn copies_cover(copies: &[Instruction], rel: &str) -> bool {
    copies.iter().any(|c| match c {
        Instruction::Copy { source, .. } => {
            source == rel || source == "./" || (source.ends_with('/') && rel.starts_with(source))
        }
        _ => false,
    })
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| (*a).to_owned()).collect()
}

/// Command that runs the packaged file, or a plain R session.
pub fn automatic_command(
    target: Option<(&TargetFile, &str)>,
    copies: &[Instruction],
) -> Vec<String> {
    match target {
        Some((file, rel)) if copies_cover(copies, rel) => match file.kind {
            FileKind::Script => owned(&["R", "--vanilla", "-f", rel]),
            FileKind::Document => {
                let render = format!(
                    "rmarkdown::render(input = \"{rel}\", output_format = rmarkdown::html_document())"
                );
                owned(&["R", "--vanilla", "-e", &render])
            }
            FileKind::Snapshot => owned(&["R"]),
        },
        _ => owned(&["R"]),
    }
}
