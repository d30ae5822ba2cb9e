//! Offline VIN decoder CLI

use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use vin_core::report::{self, ReportFormat};
use vin_core::{CatalogSource, DecodeOptions, Decoder, DecoderConfig};

const EXIT_INVALID_VIN: i32 = 1;
const EXIT_CATALOG: i32 = 2;
const EXIT_USAGE: i32 = 64;

#[derive(Parser)]
#[command(name = "vin-decode")]
#[command(about = "Decode VINs against a local vPIC-derived catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a VIN
    Decode {
        /// The 17-character VIN
        vin: String,

        /// Path to the catalog file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Include ranked pattern matches
        #[arg(long)]
        patterns: bool,

        /// Include the raw element/value map
        #[arg(long)]
        raw: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Model-year override
        #[arg(long = "model-year")]
        model_year: Option<i32>,

        /// Include per-stage timings
        #[arg(long)]
        diagnostics: bool,

        /// Soft decode timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                std::process::exit(EXIT_USAGE);
            }
        },
    };

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    match cli.command {
        Commands::Decode {
            vin,
            catalog,
            patterns,
            raw,
            format,
            model_year,
            diagnostics,
            timeout_ms,
        } => {
            let code = cmd_decode(
                vin, catalog, patterns, raw, format, model_year, diagnostics, timeout_ms,
            )
            .await;
            std::process::exit(code);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_decode(
    vin: String,
    catalog: PathBuf,
    patterns: bool,
    raw: bool,
    format: OutputFormat,
    model_year: Option<i32>,
    diagnostics: bool,
    timeout_ms: Option<u64>,
) -> i32 {
    if !catalog.exists() {
        error!("Catalog not found: {}", catalog.display());
        return EXIT_CATALOG;
    }

    let decoder = match Decoder::open(
        CatalogSource::SqliteFile(catalog),
        DecoderConfig::default(),
    )
    .await
    {
        Ok(decoder) => decoder,
        Err(err) => {
            error!("Failed to open catalog: {}", err);
            return EXIT_CATALOG;
        }
    };

    let options = DecodeOptions {
        model_year,
        include_pattern_details: patterns,
        include_raw_data: raw,
        include_diagnostics: diagnostics,
        timeout: timeout_ms.map(Duration::from_millis),
        ..DecodeOptions::default()
    };

    let result = decoder.decode(&vin, Some(options)).await;

    let report_format = match format {
        OutputFormat::Text => ReportFormat::Text,
        OutputFormat::Json => ReportFormat::Json,
    };
    match report::generate_report(&result, report_format) {
        Ok(rendered) => println!("{}", rendered),
        Err(err) => {
            error!("Failed to render result: {}", err);
            return EXIT_CATALOG;
        }
    }

    decoder.close();
    if result.valid {
        0
    } else {
        EXIT_INVALID_VIN
    }
}
