use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod convert;

use config::{CliConfig, OutputFormat};
use convert::{convert_all, expand_inputs, load_record, Inspection};

/// Normalise vendor adsorption isotherm exports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines instead of plain text
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse files and write one converted output per input
    Convert(ConvertArgs),
    /// Print metadata, table sizes and warnings for a file as JSON
    Inspect(InspectArgs),
    /// List the registered readers in detection order
    Parsers,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    files: Vec<String>,
    /// Reader to use instead of auto-detection
    #[arg(long)]
    parser: Option<String>,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Directory for converted files (defaults to each input's directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// TOML file with [parse] and [output] settings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    file: PathBuf,
    #[arg(long)]
    parser: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Convert(args) => {
            let config = CliConfig::load(args.config.as_deref())?.with_overrides(
                args.parser,
                args.format,
                args.output,
            );
            let inputs = expand_inputs(&args.files)?;
            info!(files = inputs.len(), format = ?config.output.format, "converting");
            let failures = convert_all(&inputs, &config)?;
            if failures > 0 {
                error!(failures, total = inputs.len(), "some files failed to convert");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect(args) => {
            let config =
                CliConfig::load(args.config.as_deref())?.with_overrides(args.parser, None, None);
            let record = load_record(&args.file, &config)?;
            let json = serde_json::to_string_pretty(&Inspection::new(&args.file, &record))
                .context("failed to serialize inspection")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Parsers => {
            for name in isotherm_parser::parser_names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ERROR {err:#}");
            ExitCode::FAILURE
        }
    }
}
