//! CLI: check schemas, validate documents, emit canonical schemas.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

use json_vet::{Draft, DocumentSource, Options, Validator, emit, structural};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check JSON Schema documents and validate JSON/NDJSON against them
#[derive(Parser, Debug)]
#[command(name = "json-vet", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// check that schema documents are well-formed for their draft
    Check(CheckArgs),
    /// validate documents against a schema
    Validate(ValidateArgs),
    /// print a schema in canonical form (refs resolved into the definitions pool)
    Emit(EmitArgs),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is validated
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// schema files (paths or quoted glob patterns)
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// reject multi-type schemas that carry type-specific keywords
    #[arg(long)]
    single_type: bool,

    /// draft for documents without `$schema`
    #[arg(long)]
    draft: Option<Draft>,
}

#[derive(Args, Debug)]
struct SchemaSettings {
    /// the schema file
    #[arg(long, short)]
    schema: PathBuf,

    /// extra schema documents that `$ref` may point into (paths or globs)
    #[arg(long, num_args = 1..)]
    refs: Vec<String>,

    /// JSON file with engine options
    #[arg(long)]
    config: Option<PathBuf>,

    /// draft for documents without `$schema` (overrides the config file)
    #[arg(long)]
    draft: Option<Draft>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// only print failures and the summary
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct EmitArgs {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One instance to validate, labelled by where it came from.
#[derive(Debug)]
struct Document {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let label = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read {label}"))?;
            if self.ndjson {
                for (n, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse {label}:{}", n + 1))?;
                    self.select(format!("{label}:{}", n + 1), value, &mut docs)?;
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse {label}"))?;
                self.select(label, value, &mut docs)?;
            }
        }
        Ok(docs)
    }

    /// Apply the JSON Pointer, then the jq filter.
    fn select(&self, label: String, value: Value, docs: &mut Vec<Document>) -> Result<()> {
        let value = match self.json_pointer.as_deref() {
            None => value,
            Some(ptr) => match value.pointer(ptr) {
                Some(x) => x.clone(),
                None => bail!("{label}: JSON pointer `{ptr}` selects nothing"),
            },
        };
        let Some(jq_expr) = self.jq_expr.as_deref() else {
            docs.push(Document { label, value });
            return Ok(());
        };
        let outputs = crate::jq_exec::apply(jq_expr, &value).with_context(|| format!("{label}: jq failed"))?;
        if outputs.len() == 1 {
            docs.extend(outputs.into_iter().map(|value| Document { label: label.clone(), value }));
        } else {
            for (i, value) in outputs.into_iter().enumerate() {
                docs.push(Document { label: format!("{label}[{i}]"), value });
            }
        }
        Ok(())
    }
}

impl SchemaSettings {
    fn options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => Options::load(path)?,
            None => Options::default(),
        };
        if let Some(draft) = self.draft {
            options = options.draft(draft);
        }
        Ok(options)
    }

    fn build(&self) -> Result<Validator> {
        let options = self.options()?;
        let schema = read_json(&self.schema)?;
        let mut source = DocumentSource::new(options.draft);
        for path in resolve_file_path_patterns(&self.refs)? {
            source.insert_file(&path)?;
        }
        debug!(documents = source.len(), "reference documents loaded");
        let validator = Validator::with_options(&schema, options, &source)
            .with_context(|| format!("schema {} is unusable", self.schema.display()))?;
        Ok(validator)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `Ok(false)` when every step ran but something did not pass.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Validate(target) => target.run(),
            Command::Emit(target) => target.run().map(|()| true),
        }
    }
}

impl CheckArgs {
    fn run(&self) -> Result<bool> {
        let fallback = self.draft.unwrap_or_else(json_vet::draft::default_draft);
        let mut failed = 0usize;
        let paths = resolve_file_path_patterns(&self.input)?;
        for path in &paths {
            let label = path.display();
            let doc = read_json(path)?;
            match structural::check_document(&doc, fallback, self.single_type) {
                Ok(draft) => println!("{} {label} ({draft})", "✓".green()),
                Err(error) => {
                    failed += 1;
                    println!("{} {label}\n  {error}", "✗".red());
                }
            }
        }
        summary(paths.len() - failed, failed);
        Ok(failed == 0)
    }
}

impl ValidateArgs {
    fn run(&self) -> Result<bool> {
        let validator = self.schema_settings.build()?;
        let docs = self.input_settings.load()?;

        let outcomes: Vec<(&Document, json_vet::Result<()>)> =
            docs.par_iter().map(|doc| (doc, validator.validate(&doc.value))).collect();

        let mut failed = 0usize;
        for (doc, outcome) in &outcomes {
            match outcome {
                Ok(()) if !self.quiet => println!("{} {}", "✓".green(), doc.label),
                Ok(()) => {}
                Err(json_vet::Error::Invalid(error)) => {
                    failed += 1;
                    println!("{} {}", "✗".red(), doc.label);
                    for line in error.report().lines() {
                        println!("    {line}");
                    }
                }
                // the schema itself cannot be evaluated; stop here
                Err(error) => bail!("{}: {error}", doc.label),
            }
        }
        summary(outcomes.len() - failed, failed);
        Ok(failed == 0)
    }
}

impl EmitArgs {
    fn run(&self) -> Result<()> {
        let validator = self.schema_settings.build()?;
        let schema = emit::serialize(validator.root(), validator.draft());
        let schema_src = serde_json::to_string_pretty(&schema)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &schema_src).with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{schema_src}");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_json(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("failed to parse {}", path.display()))
}

fn summary(passed: usize, failed: usize) {
    let failed_text = format!("{failed} failed");
    let failed_text = if failed > 0 { failed_text.red().bold() } else { failed_text.normal() };
    eprintln!("{} passed, {failed_text}", passed.to_string().green());
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matches nothing is almost always a typo
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
