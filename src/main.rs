use clap::Parser;
use passport_reader::models::format_date;
use passport_reader::processing::batch::{collect_documents, parse_paths, BatchResult};
use passport_reader::{DocumentRecord, ParserConfig, PassportError, PassportParser};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "passport_reader")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract identity fields from passport scans (JPEG, PNG, PDF)", long_about = None)]
struct Cli {
    /// Documents or directories of documents
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// JSON parser configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print records as JSON instead of a report
    #[arg(long, conflicts_with = "flat")]
    json: bool,

    /// Print the flat spreadsheet mapping as JSON
    #[arg(long)]
    flat: bool,

    /// Worker threads for batches
    #[arg(long)]
    workers: Option<usize>,

    /// Tesseract data directory (default: $TESSDATA_PREFIX)
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Guess sex from the given name when no document field states it
    #[arg(long)]
    infer_sex: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn build_config(cli: &Cli) -> Result<ParserConfig, PassportError> {
    let mut config = match &cli.config {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }
    if cli.tessdata.is_some() {
        config.tessdata_path = cli.tessdata.clone();
    }
    if cli.infer_sex {
        config.infer_sex_from_given_name = true;
    }
    config.validate()?;
    Ok(config)
}

fn expand_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PassportError> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(collect_documents(input)?);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn print_report(path: &std::path::Path, record: &DocumentRecord) {
    println!("\n===============================================");
    println!("  {}", path.display());
    println!("===============================================");
    println!("  Last Name:       {}", or_dash(&record.last_name));
    println!("  First Name:      {}", or_dash(&record.first_name));
    println!("  Sex:             {}", or_dash(record.sex.code()));
    println!(
        "  Date of Birth:   {}",
        record.birth_date.map(format_date).unwrap_or_else(|| "-".to_string())
    );
    println!("  IIN:             {}", or_dash(&record.national_id));
    println!("  Document Number: {}", or_dash(&record.document_number));
    println!(
        "  Expiry Date:     {}",
        record.expiry_date.map(format_date).unwrap_or_else(|| "-".to_string())
    );
    println!("  Nationality:     {}", record.nationality.as_deref().unwrap_or("-"));
    println!("  Phone:           {}", record.phone.as_deref().unwrap_or("-"));
    if record.mrz_last_name.is_some() || record.mrz_first_name.is_some() {
        println!(
            "  MRZ Name:        {} {}",
            record.mrz_last_name.as_deref().unwrap_or("-"),
            record.mrz_first_name.as_deref().unwrap_or("-")
        );
    }
    println!(
        "  Record:          {}",
        if record.is_valid() { "VALID" } else { "INCOMPLETE" }
    );
}

fn print_results(cli: &Cli, results: &BatchResult) -> Result<(), PassportError> {
    if cli.json || cli.flat {
        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|(path, result)| match result {
                Ok(record) => {
                    let body = if cli.flat {
                        serde_json::to_value(record.to_flat_map())
                    } else {
                        serde_json::to_value(record)
                    };
                    serde_json::json!({
                        "path": path.display().to_string(),
                        "valid": record.is_valid(),
                        "record": body.unwrap_or(serde_json::Value::Null),
                    })
                }
                Err(e) => serde_json::json!({
                    "path": path.display().to_string(),
                    "error": e.to_string(),
                }),
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&entries)
            .map_err(|e| PassportError::IoError(format!("Failed to render JSON: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    for (path, result) in results {
        match result {
            Ok(record) => print_report(path, record),
            Err(e) => eprintln!("Error parsing {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<bool, PassportError> {
    let config = build_config(cli)?;
    let workers = config.workers;
    let parser = PassportParser::new(config)?;

    let paths = expand_paths(&cli.paths)?;
    if paths.is_empty() {
        log::warn!("No supported documents found");
        return Ok(true);
    }

    let results = parse_paths(&paths, &parser, workers)?;
    print_results(cli, &results)?;
    Ok(results.iter().all(|(_, result)| result.is_ok()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
