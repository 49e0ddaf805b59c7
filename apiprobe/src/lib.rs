#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use apiprobe_core::{
    default_apiprobe_toml, load_config, ApiDocument, CoverageGenerator, GenerationMode,
    MutationTable, Operation, OperationSerializer, ProbeConfig, RandomCases,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "apiprobe",
    version,
    about = "Generate API test cases from a resolved API document"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print deterministic boundary and negative cases.
    Coverage {
        /// Resolved API document (JSON).
        document: PathBuf,
        /// Only this operation, e.g. "GET /users/{id}".
        #[arg(long)]
        operation: Option<String>,
        /// Generation mode (repeatable); defaults to the configured modes.
        #[arg(long = "mode", value_enum)]
        modes: Vec<ModeArg>,
        /// Apply wire serialization to parameter values.
        #[arg(long)]
        serialize: bool,
    },
    /// Print seeded random positive cases.
    Fuzz {
        document: PathBuf,
        #[arg(long)]
        operation: Option<String>,
        /// Cases per operation.
        #[arg(long)]
        cases: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        serialize: bool,
    },
    /// Print the declared links.
    Transitions { document: PathBuf },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the built-in apiprobe.toml.
    Default,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModeArg {
    Positive,
    Negative,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Positive => GenerationMode::Positive,
            ModeArg::Negative => GenerationMode::Negative,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => error_exit(&message),
    }
}

/// Runs `cli`, writing results to `out`.
pub fn execute(cli: Cli, out: &mut impl Write) -> Result<(), String> {
    match cli.command {
        Command::Config {
            command: ConfigCommand::Default,
        } => write!(out, "{}", default_apiprobe_toml()).map_err(write_error),
        Command::Transitions { document } => {
            let document = load_document(&document)?;
            for link in document.transitions().links() {
                write_json_line(out, link)?;
            }
            Ok(())
        }
        Command::Coverage {
            document,
            operation,
            modes,
            serialize,
        } => {
            let config = load_config()?;
            let document = load_document(&document)?;
            let modes: Vec<GenerationMode> = if modes.is_empty() {
                config.generation.modes.clone()
            } else {
                modes.into_iter().map(GenerationMode::from).collect()
            };
            let table = MutationTable::standard();
            let arena = document.arena();
            let generator = CoverageGenerator::new(&config.generation, &table, &arena);
            for operation in select_operations(&document, operation.as_deref())? {
                let cases = generator.generate(operation, &modes);
                info!("{}: {} coverage cases", operation.label(), cases.len());
                let serializer = serialize.then(|| OperationSerializer::new(operation));
                for case in cases {
                    match &serializer {
                        Some(serializer) => write_json_line(out, &serializer.serialize(&case))?,
                        None => write_json_line(out, &case)?,
                    }
                }
            }
            Ok(())
        }
        Command::Fuzz {
            document,
            operation,
            cases,
            seed,
            serialize,
        } => {
            let config = fuzz_config(load_config()?, cases, seed);
            let document = load_document(&document)?;
            let arena = document.arena();
            for operation in select_operations(&document, operation.as_deref())? {
                let stream =
                    RandomCases::new(operation, &arena, &config).map_err(|error| error.to_string())?;
                let serializer = serialize.then(|| OperationSerializer::new(operation));
                for case in stream.take(config.fuzzing.cases) {
                    match &serializer {
                        Some(serializer) => write_json_line(out, &serializer.serialize(&case))?,
                        None => write_json_line(out, &case)?,
                    }
                }
            }
            Ok(())
        }
    }
}

/// Command-line flags win over the loaded configuration.
pub fn fuzz_config(mut config: ProbeConfig, cases: Option<usize>, seed: Option<u64>) -> ProbeConfig {
    if let Some(cases) = cases {
        config.fuzzing.cases = cases;
    }
    if let Some(seed) = seed {
        config.fuzzing.seed = seed;
    }
    config
}

pub fn load_document(path: &Path) -> Result<ApiDocument, String> {
    let contents = fs::read_to_string(path)
        .map_err(|error| format!("failed to read document '{}': {error}", path.display()))?;
    ApiDocument::from_json_str(&contents).map_err(|error| format!("{}: {error}", path.display()))
}

pub fn select_operations<'d>(
    document: &'d ApiDocument,
    label: Option<&str>,
) -> Result<Vec<&'d Operation>, String> {
    match label {
        None => Ok(document.operations.iter().collect()),
        Some(label) => document
            .operation(label)
            .map(|operation| vec![operation])
            .ok_or_else(|| format!("unknown operation '{label}'")),
    }
}

fn write_json_line<T: Serialize>(out: &mut impl Write, value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value).map_err(|error| format!("failed to encode: {error}"))?;
    writeln!(out, "{line}").map_err(write_error)
}

fn write_error(error: io::Error) -> String {
    format!("failed to write output: {error}")
}

fn error_exit(message: &str) -> ExitCode {
    eprintln!("{message}");
    ExitCode::from(2)
}
