//! CLI: manifest runs, single units, and the shape debug view.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use schema_typegen::{
    generate_unit, generate_units, loader, shape, Diagnostic, GenerationReport, GenerationUnit, GeneratorOptions,
    Manifest, SchemaReference,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate serde data types from JSON Schema documents
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run every unit of a manifest and write the outputs
    Generate(GenerateOut),
    /// generate one unit to a file or stdout
    Rust(RustOut),
    /// print the shape of every definition as JSON
    Shapes(ShapesOut),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DiagnosticsFormat {
    #[default]
    Human,
    Json,
}

#[derive(Args, Debug)]
struct GenerateOut {
    /// manifest file listing the generation units
    #[arg(long, short)]
    manifest: PathBuf,

    /// how diagnostics are printed
    #[arg(long, value_enum, default_value_t)]
    diagnostics: DiagnosticsFormat,

    /// compare outputs with the files on disk instead of writing them
    #[arg(long)]
    check: bool,
}

#[derive(Args, Debug)]
struct RustOut {
    /// schema reference, `path/to/schema.json[#/json/pointer]`
    #[arg(long)]
    schema: SchemaReference,

    /// name of the generated root type
    #[arg(long, default_value = "Root")]
    container: String,

    /// title or definition key of the root
    #[arg(long)]
    root_name: Option<String>,

    /// hand-written type names that must not be generated
    #[arg(long = "existing")]
    existing: Vec<String>,

    /// runtime crate path used by the generated code
    #[arg(long)]
    runtime_path: Option<String>,

    /// leave schema descriptions out of the output
    #[arg(long)]
    no_docs: bool,

    /// output .rs file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    diagnostics: DiagnosticsFormat,
}

#[derive(Args, Debug)]
struct ShapesOut {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Generate(target) => target.run(),
            Command::Rust(target) => target.run(),
            Command::Shapes(target) => target.run(),
        }
    }
}

impl GenerateOut {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let manifest = match Manifest::load(&self.manifest) {
            Ok(manifest) => manifest,
            Err(error) => {
                print_diagnostics(&[error.to_diagnostic(&self.manifest)], self.diagnostics)?;
                return Ok(ExitCode::FAILURE);
            }
        };
        let base = self.manifest.parent().unwrap_or(Path::new("."));
        let report = generate_units(manifest.units(base), &manifest.options);

        let mut stale = Vec::new();
        for file in report.files() {
            let Some(output) = file.output.as_ref() else {
                println!("{}", file.contents);
                continue;
            };
            if self.check {
                let current = std::fs::read_to_string(output).unwrap_or_default();
                if current != file.contents {
                    stale.push(output.clone());
                }
            } else {
                write_output(output, &file.contents)?;
                tracing::info!(output = %output.display(), "wrote generated types");
            }
        }

        print_report(&report, self.diagnostics)?;
        for output in &stale {
            eprintln!("stale: {}", output.display());
        }
        Ok(exit_code(report.has_errors() || !stale.is_empty()))
    }
}

impl RustOut {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let mut options = GeneratorOptions {
            emit_docs: !self.no_docs,
            ..GeneratorOptions::default()
        };
        if let Some(runtime_path) = &self.runtime_path {
            options.runtime_path = runtime_path.clone();
        }
        let mut unit = GenerationUnit::new(self.schema.clone(), &self.container)
            .with_existing_types(self.existing.iter().cloned());
        unit.root_name = self.root_name.clone();

        let outcome = generate_unit(unit, &options);
        print_diagnostics(&outcome.diagnostics, self.diagnostics)?;
        let Some(file) = outcome.file else {
            return Ok(ExitCode::FAILURE);
        };
        match self.out.as_ref() {
            Some(out) => write_output(out, &file.contents)?,
            None => println!("{}", file.contents),
        }
        Ok(exit_code(outcome.diagnostics.iter().any(Diagnostic::is_error)))
    }
}

impl ShapesOut {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut report = IndexMap::new();
        let mut failures = Vec::new();
        for source_path in source_paths {
            match loader::load_document(&source_path, None, None) {
                Ok(doc) => {
                    report.insert(source_path.to_string_lossy().to_string(), shape::survey(&doc));
                }
                Err(error) => failures.push(error.to_diagnostic()),
            }
        }
        let report_src = serde_json::to_string_pretty(&report)?;
        match self.out.as_ref() {
            Some(out) => write_output(out, &report_src)?,
            None => println!("{report_src}"),
        }
        print_diagnostics(&failures, DiagnosticsFormat::Human)?;
        Ok(exit_code(!failures.is_empty()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_report(report: &GenerationReport, format: DiagnosticsFormat) -> anyhow::Result<()> {
    let diagnostics = report.diagnostics().cloned().collect::<Vec<_>>();
    print_diagnostics(&diagnostics, format)?;
    if format == DiagnosticsFormat::Human {
        let failed = report.failed_units();
        eprintln!(
            "{} unit(s) generated, {failed} failed",
            report.outcomes.len() - failed
        );
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic], format: DiagnosticsFormat) -> anyhow::Result<()> {
    match format {
        DiagnosticsFormat::Human => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic.render_human());
            }
        }
        DiagnosticsFormat::Json => {
            println!("{}", serde_json::to_string_pretty(diagnostics)?);
        }
    }
    Ok(())
}

fn write_output(out: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn exit_code(failed: bool) -> ExitCode {
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
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
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
