//! OracleLab: replay recorded mutation-analysis snapshots offline.
//!
//! A snapshot dump holds a test suite plus every observation captured while
//! running it against the reference program and each mutant. OracleLab runs
//! the oracle synthesizer over a dump and prints the resulting assertions.
//!
//! # Quick Start
//!
//! ```bash
//! oraclelab validate oraclelab/dumps/stack.yaml
//! oraclelab synthesize oraclelab/dumps/stack.yaml
//! oraclelab synthesize oraclelab/dumps/stack.yaml --json --config oracle.toml
//! ```

use clap::{ArgAction, Args, Parser, Subcommand};
use mutoracle::config;
use mutoracle::snapshot::SnapshotDump;
use mutoracle::synthesis::{OracleSynthesizer, SynthesisReport};
use mutoracle::testcase::TestSuite;
use mutoracle::OracleConfig;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "oraclelab",
    version,
    about = "Synthesize regression oracles from recorded mutation snapshots",
    long_about = "OracleLab replays a snapshot dump (reference and mutant observations\n\
        of a generated test suite) and attaches the assertions that distinguish\n\
        the reference program from its mutants."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    /// TOML configuration file (env overrides still apply)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize assertions from a snapshot dump
    Synthesize(SynthesizeArgs),

    /// Check that every record of a dump resolves to a statement
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct SynthesizeArgs {
    /// Path to the dump (YAML or JSON)
    dump: PathBuf,

    /// Write the annotated test suite here as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Path to the dump (YAML or JSON)
    dump: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_dump(path: &Path) -> Result<SnapshotDump, String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| {
            format!(
                "Failed to parse {}: {e}. Hint: values are written as {{kind: int, value: 3}}",
                path.display()
            )
        })
    } else {
        SnapshotDump::from_json(&text).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
    }
}

fn load_config(path: Option<&Path>) -> Result<OracleConfig, String> {
    config::load(path).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Synthesize
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AssertionLine {
    position: usize,
    assertion: String,
}

#[derive(Serialize)]
struct TestOutput {
    test_id: u64,
    assertions: Vec<AssertionLine>,
}

fn assertion_lines(suite: &TestSuite) -> Vec<TestOutput> {
    suite
        .test_cases()
        .iter()
        .map(|tc| TestOutput {
            test_id: tc.id().0,
            assertions: tc
                .statements()
                .iter()
                .enumerate()
                .flat_map(|(position, statement)| {
                    statement.assertions().iter().map(move |a| AssertionLine {
                        position,
                        assertion: a.to_string(),
                    })
                })
                .collect(),
        })
        .collect()
}

fn format_synthesis(path: &Path, suite: &TestSuite, report: &SynthesisReport, json: bool) -> String {
    if json {
        let value = serde_json::json!({
            "dump": path.display().to_string(),
            "report": report.to_json(),
            "tests": assertion_lines(suite),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut out = String::new();
        for test_case in suite.test_cases() {
            out.push_str(&test_case.to_string());
            out.push('\n');
        }
        out.push_str(&report.to_text());
        out
    }
}

#[allow(clippy::needless_pass_by_value)]
fn cmd_synthesize(args: SynthesizeArgs, json: bool, config: &OracleConfig) -> Result<(), String> {
    let dump = load_dump(&args.dump)?;
    let issues = dump.validate();
    if !issues.is_empty() {
        let detail: Vec<String> = issues.iter().map(|i| format!("  - {i}")).collect();
        return Err(format!("Dump is inconsistent:\n{}", detail.join("\n")));
    }

    let (store, mut suite) = dump.into_parts();
    let report = OracleSynthesizer::new(config.synthesis)
        .synthesize(&store, &mut suite)
        .map_err(|e| format!("Synthesis aborted: {e}"))?;

    println!("{}", format_synthesis(&args.dump, &suite, &report, json));

    if let Some(output) = args.output {
        let text = serde_json::to_string_pretty(&suite)
            .map_err(|e| format!("Failed to serialize suite: {e}"))?;
        fs::write(&output, text).map_err(|e| format!("Failed to write {}: {e}", output.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)]
fn cmd_validate(args: ValidateArgs, json: bool) -> Result<(), String> {
    let dump = load_dump(&args.dump)?;
    let issues = dump.validate();

    if json {
        let report = serde_json::json!({
            "dump": args.dump.display().to_string(),
            "test_cases": dump.suite.len(),
            "records": dump.records.len(),
            "valid": issues.is_empty(),
            "errors": issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        let pretty = serde_json::to_string_pretty(&report).unwrap_or_default();
        println!("{pretty}");
    } else if issues.is_empty() {
        println!(
            "Dump '{}' is valid ({} test cases, {} records)",
            args.dump.display(),
            dump.suite.len(),
            dump.records.len()
        );
    } else {
        let mut lines = vec![format!("Dump '{}' has errors:", args.dump.display())];
        for issue in &issues {
            lines.push(format!("  - {issue}"));
        }
        println!("{}", lines.join("\n"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err("Dump validation failed".to_string())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Synthesize(args) => cmd_synthesize(args, cli.json, &config),
        Command::Validate(args) => cmd_validate(args, cli.json),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {msg}");
            ExitCode::FAILURE
        }
    }
}
