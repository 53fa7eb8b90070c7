//! Runs JSON-Schema-Test-Suite style fixtures against the engine.
//!
//! Fixtures live in one directory per draft (`draft4/`, `draft2019-09/`,
//! `draft2020-12/`); the directory name picks the default draft for every
//! schema inside it.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use json_vet::path_de::from_str_with_path;
use json_vet::{Draft, Error, NoSource, Options, Validator};

/// run JSON Schema test-suite fixtures
#[derive(Parser, Debug)]
struct Cli {
    /// only run cases whose `file: group / case` label matches
    #[arg(long)]
    filter: Option<Regex>,

    /// print passing cases too
    #[arg(long, short)]
    verbose: bool,

    /// fixture directories (defaults to the bundled fixtures)
    roots: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Group {
    description: String,
    schema: Value,
    tests: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct Case {
    description: String,
    data: Value,
    valid: bool,
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
    skipped: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(tally) => {
            println!(
                "{} passed, {} failed, {} filtered out",
                tally.passed.to_string().green(),
                tally.failed.to_string().red(),
                tally.skipped
            );
            if tally.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<Tally> {
    let roots = if cli.roots.is_empty() {
        vec![PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")]
    } else {
        cli.roots.clone()
    };
    let mut tally = Tally::default();
    for root in &roots {
        for dir in sorted_entries(root)? {
            let Some(draft) = dir.file_name().and_then(|n| n.to_str()).and_then(|n| n.parse::<Draft>().ok()) else {
                continue;
            };
            for file in sorted_entries(&dir)? {
                if file.extension().is_some_and(|e| e == "json") {
                    run_file(cli, &file, draft, &mut tally)?;
                }
            }
        }
    }
    Ok(tally)
}

fn run_file(cli: &Cli, file: &Path, draft: Draft, tally: &mut Tally) -> Result<()> {
    let source = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let groups: Vec<Group> = from_str_with_path(&source).with_context(|| format!("bad fixture {}", file.display()))?;
    let file_label = format!("{draft}/{}", file.file_stem().unwrap_or_default().to_string_lossy());
    let options = Options::default().draft(draft);

    for group in &groups {
        let built = Validator::with_options(&group.schema, options, &NoSource);
        for case in &group.tests {
            let label = format!("{file_label}: {} / {}", group.description, case.description);
            if cli.filter.as_ref().is_some_and(|f| !f.is_match(&label)) {
                tally.skipped += 1;
                continue;
            }
            let verdict = match &built {
                Err(error) => Err(format!("schema rejected: {error}")),
                Ok(validator) => judge(validator.validate(&case.data), case.valid),
            };
            match verdict {
                Ok(()) => {
                    tally.passed += 1;
                    if cli.verbose {
                        println!("{} {label}", "✓".green());
                    }
                }
                Err(reason) => {
                    tally.failed += 1;
                    println!("{} {label}\n    {reason}", "✗".red());
                }
            }
        }
    }
    Ok(())
}

/// Only instance failures count as "invalid"; every other error is a miss.
fn judge(outcome: json_vet::Result<()>, expect_valid: bool) -> Result<(), String> {
    match (outcome, expect_valid) {
        (Ok(()), true) | (Err(Error::Invalid(_)), false) => Ok(()),
        (Ok(()), false) => Err("accepted an invalid instance".to_string()),
        (Err(Error::Invalid(e)), true) => Err(format!("rejected a valid instance: {e}")),
        (Err(other), _) => Err(format!("engine error: {other}")),
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_fixtures_pass() {
        let tally = run(&Cli { filter: None, verbose: false, roots: Vec::new() }).unwrap();
        assert!(tally.passed > 0);
        assert_eq!(tally.failed, 0);
        assert_eq!(tally.skipped, 0);
    }

    #[test]
    fn filter_skips_unmatched_cases() {
        let filter = Regex::new("^no fixture is labelled like this$").unwrap();
        let tally = run(&Cli { filter: Some(filter), verbose: false, roots: Vec::new() }).unwrap();
        assert_eq!(tally.passed + tally.failed, 0);
        assert!(tally.skipped > 0);
    }

    #[test]
    fn engine_errors_are_misses() {
        assert!(judge(Ok(()), true).is_ok());
        assert!(judge(Ok(()), false).is_err());
        let unresolved = json_vet::ReferenceError::Unresolved { reference: "x".into(), pointer: "#".into() };
        assert!(judge(Err(Error::Reference(unresolved)), false).is_err());
    }
}
