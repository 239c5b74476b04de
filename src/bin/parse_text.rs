//! Runs extraction and arbitration on text that was already recognised,
//! e.g. saved OCR output from a previous run. No OCR engine is involved.

use clap::Parser;
use passport_reader::{NoopObserver, ParserConfig, PassportError, PassportParser};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "parse_text")]
#[command(about = "Parse passport fields from full-page OCR text and optional MRZ text", long_about = None)]
struct Cli {
    /// Full-page OCR text ("-" for stdin)
    text: PathBuf,

    /// Text of a dedicated MRZ pass
    #[arg(long)]
    mrz: Option<PathBuf>,

    /// JSON parser configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the flat spreadsheet mapping instead of the record
    #[arg(long)]
    flat: bool,

    /// Log every field decision
    #[arg(short, long)]
    verbose: bool,
}

fn read_input(path: &PathBuf) -> Result<String, PassportError> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).map_err(PassportError::from);
    }
    std::fs::read_to_string(path)
        .map_err(|e| PassportError::IoError(format!("{}: {}", path.display(), e)))
}

fn run(cli: &Cli) -> Result<(), PassportError> {
    let config = match &cli.config {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };

    let mut parser = PassportParser::new(config)?;
    if !cli.verbose {
        parser = parser.with_observer(NoopObserver);
    }

    let text = read_input(&cli.text)?;
    let mrz = cli.mrz.as_ref().map(read_input).transpose()?;
    let record = parser.parse_text_pair(&text, mrz.as_deref());

    let rendered = if cli.flat {
        serde_json::to_string_pretty(&record.to_flat_map())
    } else {
        serde_json::to_string_pretty(&record)
    }
    .map_err(|e| PassportError::IoError(format!("Failed to render JSON: {}", e)))?;
    println!("{}", rendered);

    if !record.is_valid() {
        log::warn!("Record is incomplete");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
