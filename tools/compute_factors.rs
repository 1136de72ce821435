//! Cross-Sectional Factor Tool
//!
//! Computes the 20 order-book factors for every snapshot in a set of daily
//! CSV files and writes one averaged row per time key.
//!
//! Each input file is one map partition. Files are processed in parallel,
//! routed by time key and reduced into a single sorted CSV.
//!
//! # Usage
//!
//! ```bash
//! # Default configuration
//! cargo run --release --bin compute_factors -- --output factors.csv data/*.csv
//!
//! # From TOML config, 8 threads, keep going past broken files
//! cargo run --release --bin compute_factors -- --config factors.toml \
//!     --threads 8 --collect-errors --output factors.csv data/*.csv
//!
//! # Generate sample config
//! cargo run --release --bin compute_factors -- --generate-config factors.toml
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) for partition summaries.

use std::path::PathBuf;

use lob_factor_aggregator::batch::{BatchConfig, BatchProcessor, ConsoleProgress, ErrorMode};
use lob_factor_aggregator::export::{write_factor_csv, write_partials, ExportMetadata};
use lob_factor_aggregator::{AggregatorBuilder, AggregatorConfig, FactorRow, TimeKeyScope};

/// Parsed command line.
struct Args {
    config: Option<PathBuf>,
    output: PathBuf,
    partials: Option<PathBuf>,
    threads: Option<usize>,
    error_mode: ErrorMode,
    verbose: bool,
    inputs: Vec<PathBuf>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--help" | "-h" => print_usage(&args[0]),
        "--generate-config" => {
            if args.len() < 3 {
                eprintln!("Error: --generate-config requires a path argument");
                std::process::exit(1);
            }
            generate_sample_config(&args[2]);
        }
        _ => match parse_args(&args[1..]) {
            Ok(parsed) => {
                if let Err(e) = run(&parsed) {
                    eprintln!("❌ Run failed: {}", e);
                    std::process::exit(1);
                }
            }
            Err(msg) => {
                eprintln!("Error: {}", msg);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        },
    }
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Cross-Sectional Factor Tool

Usage:
    {program} [options] --output <factors.csv> <input.csv>...
    {program} --generate-config <path.toml>
    {program} --help

Options:
    --config <path.toml>     Aggregator configuration (default settings otherwise)
    --output <path.csv>      Final factor CSV
    --partials <path>        Also write per-key totals for later merging
    --threads <n>            Worker threads (default: all cores)
    --collect-errors         Skip unreadable files instead of failing
    --verbose                Per-file progress
"#
    );
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config = None;
    let mut output = None;
    let mut partials = None;
    let mut threads = None;
    let mut error_mode = ErrorMode::FailFast;
    let mut verbose = false;
    let mut inputs = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--output" => output = Some(PathBuf::from(value("--output")?)),
            "--partials" => partials = Some(PathBuf::from(value("--partials")?)),
            "--threads" => {
                let raw = value("--threads")?;
                let n: usize = raw
                    .parse()
                    .map_err(|_| format!("--threads expects a number, got '{}'", raw))?;
                if n == 0 {
                    return Err("--threads must be > 0".to_string());
                }
                threads = Some(n);
            }
            "--collect-errors" => error_mode = ErrorMode::CollectErrors,
            "--verbose" => verbose = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            path => inputs.push(PathBuf::from(path)),
        }
    }

    let output = output.ok_or("--output is required")?;
    if inputs.is_empty() {
        return Err("no input files given".to_string());
    }

    Ok(Args {
        config,
        output,
        partials,
        threads,
        error_mode,
        verbose,
        inputs,
    })
}

/// Write a sample configuration.
fn generate_sample_config(path: &str) {
    let config = AggregatorBuilder::new()
        .state_capacity(2000)
        .time_key_scope(TimeKeyScope::TradingDay)
        .run("cross_section", "Market-wide factor averages per second")
        .build_config()
        .map_err(Box::<dyn std::error::Error>::from);

    match config.and_then(|c| c.save_toml(path)) {
        Ok(()) => println!("✅ Generated sample config: {}", path),
        Err(e) => {
            eprintln!("Error generating config: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            let c = AggregatorConfig::load_toml(path)?;
            println!("✅ Loaded configuration: {}", path.display());
            c
        }
        None => AggregatorConfig::default(),
    };

    println!(
        "📅 {} input files, state capacity {}, {} reduce partitions",
        args.inputs.len(),
        config.state.capacity,
        config.aggregation.reduce_partitions
    );

    let mut batch_config = BatchConfig::new()
        .with_error_mode(args.error_mode)
        .with_progress(args.verbose);
    if let Some(n) = args.threads {
        batch_config = batch_config.with_threads(n);
    }

    let mut processor = BatchProcessor::new(config, batch_config);
    if args.verbose {
        processor = processor.with_progress_callback(Box::new(ConsoleProgress::new().verbose()));
    }

    let output = processor.process_files(&args.inputs)?;

    for error in output.iter_errors() {
        eprintln!("⚠️  Skipped {}: {}", error.name, error.error);
    }

    if let Some(path) = &args.partials {
        let tuples: Vec<_> = output.rows.iter().map(FactorRow::to_tuple).collect();
        write_partials(path, &tuples)?;
        println!("✅ Partials: {}", path.display());
    }

    write_factor_csv(&args.output, &output.rows)?;
    ExportMetadata::from_rows(&output.rows).write(args.output.with_extension("json"))?;

    println!(
        "✅ {} rows ({} samples) from {} files in {:?}",
        output.rows.len(),
        output.total_samples(),
        output.successful_count(),
        output.elapsed
    );
    Ok(())
}
