//! ECU Log Analyzer CLI Application
//!
//! This is the command-line interface for the ECU log analyzer.
//! It uses the ecu-log-core library and adds:
//! - TOML configuration with environment overrides
//! - Batch runs over a log directory
//! - JSON report output

use anyhow::{Context, Result};
use clap::Parser;
use ecu_log_core::{LogRecordParser, ParsedLog, ServiceBusReconstructor};
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::AppConfig;
use report::{AnalysisReport, SoaSection};

/// Manifest file name looked up next to the logs when none is given
const DEFAULT_MANIFEST: &str = "Summary_Report.json";

/// ECU Log Analyzer - TRAP diagnosis and SOA counter analysis for ECU logs
#[derive(Parser, Debug)]
#[command(name = "ecu-log-cli")]
#[command(about = "Analyze ECU diagnostic logs (TRAP resets, CPU load, SOA counters)", long_about = None)]
#[command(version)]
struct Args {
    /// Directory scanned recursively for log files
    #[arg(short = 'd', long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log file(s) to analyze (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    log: Vec<PathBuf>,

    /// Linker map file used to name TRAP addresses
    #[arg(short, long, value_name = "FILE")]
    map: Option<PathBuf>,

    /// SOA channel manifest (JSON with a TOPIC list)
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for the JSON report
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Parse files one at a time instead of on the worker pool
    #[arg(long)]
    serial: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    app_config.apply_env_overrides()?;
    apply_args(&mut app_config, &args);

    let verbose = if app_config.verbose { args.verbose.max(1) } else { args.verbose };
    init_logging(verbose, args.quiet);

    log::info!("ECU Log Analyzer CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using analyzer library v{}", ecu_log_core::VERSION);

    if app_config.input.log_dir.is_none() && app_config.input.log_files.is_empty() {
        println!("ECU Log Analyzer - No input specified");
        println!("\nQuick Start:");
        println!("  ecu-log-cli --log-dir logs/ --map build/app.map");
        println!("  ecu-log-cli --log console.log --manifest Summary_Report.json");
        println!("\nFor all settings:");
        println!("  ecu-log-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    run(&app_config, args.quiet)
}

/// Command line arguments take precedence over file and environment settings
fn apply_args(app_config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.log_dir {
        app_config.input.log_dir = Some(dir.clone());
    }
    if !args.log.is_empty() {
        app_config.input.log_files = args.log.clone();
    }
    if let Some(map) = &args.map {
        app_config.input.map_file = Some(map.clone());
    }
    if let Some(manifest) = &args.manifest {
        app_config.input.manifest = Some(manifest.clone());
    }
    if let Some(output) = &args.output {
        app_config.output.output_dir = output.clone();
    }
    if args.serial {
        app_config.parallel = false;
    }
}

/// Parse the logs, reconstruct SOA series, and write the report
fn run(app_config: &AppConfig, quiet: bool) -> Result<()> {
    let generated_at = chrono::Local::now();
    let input = &app_config.input;

    let parser = LogRecordParser::with_map_file(&app_config.analysis, input.map_file.as_deref())
        .context("Failed to set up log parser")?;

    let mut logs = Vec::new();
    if let Some(dir) = &input.log_dir {
        logs.extend(parser.parse_directory(dir, app_config.parallel));
    }
    if !input.log_files.is_empty() {
        logs.extend(parser.parse_files(&input.log_files, app_config.parallel));
    }
    logs.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    let soa = analyze_soa(app_config, &logs)?;
    let report = AnalysisReport::new(generated_at, logs, parser.extractor().stats(), soa);
    let path = report::write_report(
        &report,
        generated_at,
        &app_config.output.output_dir,
        app_config.output.pretty,
    )?;

    if !quiet {
        print_summary(&report, &path);
    }
    Ok(())
}

/// SOA reconstruction over the parsed files, if a manifest is available
fn analyze_soa(app_config: &AppConfig, logs: &[ParsedLog]) -> Result<Option<SoaSection>> {
    let Some(manifest) = manifest_path(app_config) else {
        log::info!("No channel manifest found, skipping SOA analysis");
        return Ok(None);
    };

    let mut soa = ServiceBusReconstructor::new(&app_config.analysis.soa)
        .context("Failed to set up SOA analysis")?;
    if !soa.load_manifest(&manifest) {
        return Ok(None);
    }

    let samples: usize = logs.iter().map(|log| soa.parse_log_file(&log.file_path)).sum();
    log::info!("Collected {} SOA counter lines", samples);

    if samples == 0 || !soa.process() {
        return Ok(None);
    }
    Ok(SoaSection::from_reconstructor(&soa))
}

fn manifest_path(app_config: &AppConfig) -> Option<PathBuf> {
    if let Some(path) = &app_config.input.manifest {
        return Some(path.clone());
    }
    app_config
        .input
        .log_dir
        .as_deref()
        .map(|dir| dir.join(DEFAULT_MANIFEST))
        .filter(|path| path.exists())
}

fn print_summary(report: &AnalysisReport, path: &Path) {
    let loads = &report.load_statistics;
    println!("Analyzed {} files ({} with CPU load samples)", loads.total_files, loads.valid_files);
    if !loads.projects.is_empty() {
        println!("  Projects:  {}", loads.projects.join(", "));
    }
    for (core, avg) in loads.avg_loads.iter().enumerate() {
        println!(
            "  Core {}: avg {:.2}%  max {:.2}%  min {:.2}%",
            core, avg, loads.max_loads[core], loads.min_loads[core]
        );
    }

    match &report.trap_summary {
        Some(traps) => {
            println!("TRAP resets: {}", traps.total_count);
            for detail in &traps.details {
                println!("  {:?}: {}", detail.file_path, detail.diagnosis);
            }
        }
        None => println!("TRAP resets: none"),
    }

    if let Some(soa) = &report.soa {
        let stats = &soa.report.statistics;
        println!(
            "SOA channels: {} with data, {} without, {} lost",
            stats.topics_with_data, stats.topics_without_data, stats.total_lost_data
        );
    }

    println!("Report: {}", path.display());
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
