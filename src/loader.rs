//! Program model loading.
//!
//! The analysis never parses or type-checks source itself. A front end
//! produces a JSON program-model document and a [`Loader`] turns it into a
//! validated [`Program`]: either read from a file ([`JsonLoader`]) or
//! captured from the stdout of a front-end command ([`CommandLoader`]).

use crate::model::{ModelError, Program, ProgramData};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read program model {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse program model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to run front end `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("front end `{command}` failed: {stderr}")]
    FrontEnd { command: String, stderr: String },

    #[error("invalid program model: {0}")]
    Invalid(#[from] ModelError),
}

/// Source of a type-checked program.
pub trait Loader {
    fn load(&self) -> Result<Program, LoadError>;
}

/// Parses a program-model document. Relative file paths inside it are taken
/// relative to `root`.
pub fn parse_program(json: &[u8], root: &Path) -> Result<Program, LoadError> {
    let mut data: ProgramData = serde_json::from_slice(json)?;
    Program::resolve_paths(&mut data, root);
    debug!(
        packages = data.packages.len(),
        files = data.files.len(),
        decls = data.decls.len(),
        occurrences = data.occurrences.len(),
        "parsed program model"
    );
    Ok(Program::new(data)?)
}

/// Reads the program model from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonLoader {
    path: PathBuf,
}

impl JsonLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Loader for JsonLoader {
    fn load(&self) -> Result<Program, LoadError> {
        let bytes = std::fs::read(&self.path).map_err(|source| LoadError::Read {
            path: self.path.clone(),
            source,
        })?;
        let root = self.path.parent().unwrap_or(Path::new("."));
        parse_program(&bytes, root)
    }
}

/// Runs a front-end command that prints the program model on stdout.
///
/// Every `{target}` in the program or its arguments is replaced by the
/// target package path.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    target: String,
}

impl CommandLoader {
    /// Splits `command_line` on whitespace. Quoting is not understood: an
    /// argument containing spaces has to be passed through [`Self::args`].
    pub fn new(command_line: &str, target: &str) -> Self {
        let mut words = command_line.split_whitespace();
        let program = words.next().unwrap_or_default();
        Self::with_args(program, words, target)
    }

    /// Runs `program` with `args` passed through verbatim.
    pub fn with_args<I, S>(program: &str, args: I, target: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            program: program.replace("{target}", target),
            args: Vec::new(),
            current_dir: None,
            target: target.to_string(),
        }
        .args(args)
    }

    /// Appends arguments, each kept whole.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let target = &self.target;
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().replace("{target}", target)));
        self
    }

    /// Runs the front end from `dir`; relative paths in its output resolve
    /// against the same directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Loader for CommandLoader {
    fn load(&self) -> Result<Program, LoadError> {
        let command = self.display();
        debug!(%command, "running front end");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|source| LoadError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(LoadError::FrontEnd { command, stderr });
        }

        let root = match &self.current_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| LoadError::Spawn {
                command: command.clone(),
                source,
            })?,
        };
        parse_program(&output.stdout, &root)
    }
}
