//! unexport: Find and unexport exported declarations unused outside their package.
//!
//! Loads a type-checked program model, reports the target package's exported
//! declarations that no other package needs, and renames the approved ones to
//! their unexported spelling across every file that mentions them.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Args, Commands, Source};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;
use unexport::loader::{CommandLoader, JsonLoader, Loader};
use unexport::{
    ApplyReport, DetectionResult, Error, ModelRenamer, Program, QualifiedName, Review, Unexporter,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Detect { source, json } => cmd_detect(&source, json, args.verbose),
        Commands::Apply {
            source,
            yes,
            dry_run,
            reserved,
            rename,
        } => cmd_apply(&source, yes, dry_run, reserved, rename),
        Commands::Check {
            source,
            candidate,
            to,
            reserved,
        } => cmd_check(&source, &candidate, to.as_deref(), reserved),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "unexport=info" } else { "unexport=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(source: &Source) -> Result<Program> {
    if let Some(command) = &source.frontend {
        return CommandLoader::new(command, &source.package)
            .args(&source.frontend_args)
            .load()
            .with_context(|| format!("Failed to load program model from `{}`", command));
    }
    let Some(path) = &source.model else {
        bail!("No program model given: use --model, --frontend, or set UNEXPORT_MODEL");
    };
    JsonLoader::new(path)
        .load()
        .with_context(|| format!("Failed to load program model {}", path.display()))
}

fn cmd_detect(source: &Source, json_output: bool, verbose: bool) -> Result<()> {
    let program = load(source)?;
    let (tx, rx) = mpsc::channel();
    let session =
        Unexporter::with_observer(program, &source.package, ModelRenamer::new(), Some(&tx))?;
    drop(tx);

    if verbose {
        for warning in rx.try_iter() {
            eprintln!(
                "{} {}: {}",
                "warn:".yellow().bold(),
                warning.candidate,
                warning.message
            );
        }
    }

    let result = session.detection();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_detection_result(&result, verbose);
    }

    Ok(())
}

fn cmd_apply(
    source: &Source,
    yes: bool,
    dry_run: bool,
    reserved: Vec<String>,
    renames: Vec<(QualifiedName, String)>,
) -> Result<()> {
    let program = load(source)?;
    let renamer = ModelRenamer::new().with_reserved(reserved).dry_run(dry_run);
    let mut session = Unexporter::with_renamer(program, &source.package, renamer)?;

    if session.candidates().is_empty() {
        println!("{} No unused exports found", "ok:".green().bold());
        return Ok(());
    }

    let mut review = Review::for_session(&session);
    for (id, to) in &renames {
        if let Some(conflict) = review.rename(&mut session, id, to)? {
            eprintln!("{} {} -> {}: {}", "warn:".yellow().bold(), id, to, conflict);
        }
    }

    if yes {
        accept_safe(&session, &mut review)?;
    } else {
        prompt(&mut session, &mut review)?;
    }

    if review.approved().is_empty() {
        println!("{} No changes to apply", "info:".blue().bold());
        return Ok(());
    }
    if review.is_aborted() {
        println!(
            "{} Cancelled; applying the {} rename(s) approved so far",
            "info:".blue().bold(),
            review.approved().len()
        );
    }

    let report = match session.apply_approved(&review) {
        Ok(report) => report,
        Err(Error::Rewrite { failed, report }) => {
            print_report(&report);
            for failure in &report.failures {
                eprintln!(
                    "{} {}: {}",
                    "warn:".yellow().bold(),
                    failure.path.display(),
                    failure.message
                );
            }
            bail!("failed to rewrite {} file(s)", failed);
        }
        Err(err) => return Err(err.into()),
    };
    print_report(&report);

    if dry_run {
        println!("\n{} Run without --dry-run to write changes", "hint:".cyan().bold());
    }
    Ok(())
}

fn cmd_check(
    source: &Source,
    id: &QualifiedName,
    to: Option<&str>,
    reserved: Vec<String>,
) -> Result<()> {
    let program = load(source)?;
    let renamer = ModelRenamer::new().with_reserved(reserved);
    let mut session = Unexporter::with_renamer(program, &source.package, renamer)?;

    let to = match to {
        Some(to) => to.to_string(),
        None => session
            .candidate(id)
            .map(|c| c.to.clone())
            .with_context(|| format!("{} is not an unused export of {}", id, source.package))?,
    };
    let conflict = session
        .recheck(id, &to)
        .with_context(|| format!("{} is not an unused export of {}", id, source.package))?;

    if let Some(conflict) = conflict {
        bail!("{} cannot be renamed to {}: {}", id, to, conflict);
    }
    println!("{} {} can be renamed to {}", "ok:".green().bold(), id, to);
    if let Some(candidate) = session.candidate(id)
        && !candidate.renames.is_empty()
    {
        println!("  also renames:");
        for other in &candidate.renames {
            println!("    {}", other.to_string().dimmed());
        }
    }
    Ok(())
}

/// Accepts every pending candidate without a conflict and skips the rest.
fn accept_safe(session: &Unexporter, review: &mut Review) -> Result<()> {
    while let Some(id) = review.pending().cloned() {
        let conflict = match session.candidate(&id).and_then(|c| c.conflict.clone()) {
            Some(conflict) => Some(conflict),
            None => review.approve(session, &id)?,
        };
        if let Some(conflict) = conflict {
            eprintln!(
                "{} skipping {}: {}",
                "warn:".yellow().bold(),
                id,
                conflict
            );
            review.skip(&id)?;
        }
    }
    Ok(())
}

fn prompt(session: &mut Unexporter, review: &mut Review) -> Result<()> {
    let theme = ColorfulTheme::default();
    let choices = &[
        "yes",
        "no",
        "rename to...",
        "all remaining safe ones",
        "cancel",
    ];

    while let Some(id) = review.pending().cloned() {
        let Some(candidate) = session.candidate(&id) else {
            review.skip(&id)?;
            continue;
        };
        let to = candidate.to.clone();
        println!(
            "\n{} {}:{}:{}",
            candidate.kind.to_string().dimmed(),
            candidate.file.display(),
            candidate.line,
            candidate.column
        );
        if let Some(conflict) = &candidate.conflict {
            println!("{} {}", "warn:".yellow().bold(), conflict);
        }

        let selection = Select::with_theme(&theme)
            .with_prompt(format!("unexport {} as {}?", id, to))
            .items(choices)
            .default(0)
            .interact()
            .context("Selection cancelled")?;

        match selection {
            0 => {
                if let Some(conflict) = review.approve(session, &id)? {
                    eprintln!("{} {}", "warn:".yellow().bold(), conflict);
                }
            }
            1 => review.skip(&id)?,
            2 => {
                let new_name: String = Input::with_theme(&theme)
                    .with_prompt("New name")
                    .with_initial_text(to)
                    .interact_text()
                    .context("Input cancelled")?;
                if let Some(conflict) = review.rename(session, &id, &new_name)? {
                    eprintln!("{} {}", "warn:".yellow().bold(), conflict);
                }
            }
            3 => accept_safe(session, review)?,
            _ => review.abort(),
        }
    }
    Ok(())
}

fn print_detection_result(result: &DetectionResult, verbose: bool) {
    let d = &result.diagnostics;

    if verbose {
        println!(
            "\n{} Packages: {}, Declarations: {} ({} exported, {} used externally)",
            "Diagnostics:".bold(),
            d.packages_loaded,
            d.target_declarations,
            d.exported,
            d.used_externally
        );
        println!(
            "             Candidates: {}, Conflicting: {}",
            d.candidates, d.conflicting
        );
    }

    if result.candidates.is_empty() {
        println!("{} No unused exports found", "ok:".green().bold());
        return;
    }

    println!(
        "\n{} {} unused export(s):\n",
        "Found".yellow().bold(),
        result.candidates.len()
    );

    for candidate in &result.candidates {
        let loc = format!(
            "{}:{}:{}",
            candidate.file.display(),
            candidate.line,
            candidate.column
        );
        match &candidate.conflict {
            None => {
                println!("  {} {}", loc.dimmed(), candidate.id.to_string().red());
                println!("    {} {}", "->".green(), candidate.to.green());
            }
            Some(conflict) => println!(
                "  {} {} {}",
                loc.dimmed(),
                candidate.id.to_string().red(),
                format!("({})", conflict).dimmed()
            ),
        }
    }
}

fn print_report(report: &ApplyReport) {
    let plural = |n: usize| if n == 1 { "" } else { "s" };
    println!(
        "{} {} {} occurrence{} in {} file{} in {} package{}.",
        "ok:".green().bold(),
        if report.dry_run { "Would rename" } else { "Renamed" },
        report.occurrences,
        plural(report.occurrences),
        report.files,
        plural(report.files),
        report.packages,
        plural(report.packages)
    );
}
