//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Each subcommand corresponds to a distinct operation: reporting unused
//! exports, applying renames, or checking a single rename.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use unexport::QualifiedName;

/// Find exported declarations nobody outside their package uses and unexport them.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Print analysis progress and the rename summary to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the type-checked program comes from, and which package to narrow.
#[derive(Debug, clap::Args)]
pub struct Source {
    /// Import path of the package whose exports to narrow.
    #[arg(short, long)]
    pub package: String,

    /// Program model document (JSON) produced by a front end.
    #[arg(short, long, env = "UNEXPORT_MODEL")]
    pub model: Option<PathBuf>,

    /// Front-end command that prints the program model on stdout.
    /// `{target}` is replaced by the package import path. Takes precedence over `--model`.
    #[arg(long)]
    pub frontend: Option<String>,

    /// Extra front-end argument passed whole, spaces included (repeatable).
    #[arg(long = "frontend-arg", requires = "frontend", allow_hyphen_values = true)]
    pub frontend_args: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report unused exported declarations and whether they can be unexported safely.
    Detect {
        #[command(flatten)]
        source: Source,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Review candidates and rename the approved ones.
    Apply {
        #[command(flatten)]
        source: Source,

        /// Accept every candidate without a conflict instead of prompting.
        #[arg(short, long)]
        yes: bool,

        /// Verify and report the renames without writing files.
        #[arg(long)]
        dry_run: bool,

        /// Additional names never to rename to (comma separated or repeated).
        #[arg(long, value_delimiter = ',')]
        reserved: Vec<String>,

        /// Explicit new names in `"pkg".Name=newName` format.
        #[arg(long, value_parser = parse_rename)]
        rename: Vec<(QualifiedName, String)>,
    },

    /// Check whether one candidate can take a given name.
    Check {
        #[command(flatten)]
        source: Source,

        /// Candidate as `"pkg".Name` or `("pkg".Type).Name`.
        #[arg(value_parser = parse_name)]
        candidate: QualifiedName,

        /// Name to check. Defaults to the proposed unexported name.
        to: Option<String>,

        /// Additional names never to rename to.
        #[arg(long, value_delimiter = ',')]
        reserved: Vec<String>,
    },
}

fn parse_name(s: &str) -> Result<QualifiedName, String> {
    s.parse().map_err(|e: unexport::model::ParseNameError| e.to_string())
}

fn parse_rename(s: &str) -> Result<(QualifiedName, String), String> {
    let Some((old, new)) = s.rsplit_once('=') else {
        return Err(format!("Invalid rename format '{}', expected '\"pkg\".Name=new'", s));
    };
    Ok((parse_name(old)?, new.to_string()))
}
