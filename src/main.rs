use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod clean;
mod config;
mod error;
mod menu;
mod models;
mod report;
mod runner;
mod sink;
mod source;

use config::{Config, DEFAULT_CONFIG_FILE};
use error::AttendanceError;
use menu::MenuChoice;
use models::VisitRecord;
use runner::{ReportJob, RunSummary};
use sink::FileSink;
use source::Table;

#[derive(Parser)]
#[command(name = "clinic-attendance")]
#[command(
    about = "Attendance and no-show reports for clinic appointment exports",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to ./attendance.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the scheduled date column from the raw export
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Report for a single patient
    Patient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Report kit for every patient, broken down by procedure
    Individual {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Clinic-wide consolidated report
    Consolidated {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Interactive menu (default)
    Menu {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Write a default attendance.toml
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Menu { input: None });
    let config = Config::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    debug!(?config, "configuration loaded");
    let mut sink = FileSink::new();

    match command {
        Commands::Clean { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.raw_input.clone());
            let output = output.unwrap_or_else(|| config.paths.input.clone());
            let outcome =
                clean::clean_export(&mut sink, &input, &output, &config.columns.scheduled_at)
                    .with_context(|| format!("failed to clean {}", input.display()))?;
            if !outcome.column_removed {
                println!(
                    "Warning: column '{}' was not found in {}.",
                    config.columns.scheduled_at,
                    input.display()
                );
            }
            println!("Saved {} rows to {}.", outcome.rows, output.display());
        }
        Commands::Patient { name, input } => {
            let (table, records) = load_records(&config, input.as_deref())?;
            let stamp = generated_at(&config);
            let mut job = ReportJob::new(&mut sink, &config, &table, &records, stamp);
            match job.patient_report(&name) {
                Ok(summary) => {
                    println!("Report for {name}:");
                    print!("{}", report::console_summary(&summary));
                }
                Err(AttendanceError::PatientNotFound(_)) => {
                    println!("Patient '{name}' not found.");
                }
                Err(err) => return Err(err.into()),
            }
            print_outcome(&job.finish());
        }
        Commands::Individual { input } => {
            let (table, records) = load_records(&config, input.as_deref())?;
            run_individual(&mut sink, &config, &table, &records);
        }
        Commands::Consolidated { input } => {
            let (table, records) = load_records(&config, input.as_deref())?;
            run_consolidated(&mut sink, &config, &table, &records);
        }
        Commands::Menu { input } => {
            run_menu(&mut sink, &config, input.as_deref())?;
        }
        Commands::InitConfig => init_config()?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn init_config() -> anyhow::Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{DEFAULT_CONFIG_FILE} already exists, remove it or edit it manually");
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("failed to write {DEFAULT_CONFIG_FILE}"))?;
    println!("Created {DEFAULT_CONFIG_FILE} with default settings.");
    Ok(())
}

fn generated_at(config: &Config) -> String {
    runner::format_timestamp(Local::now().naive_local(), &config.output.timestamp_format)
}

fn load_records(
    config: &Config,
    input: Option<&Path>,
) -> anyhow::Result<(Table, Vec<VisitRecord>)> {
    let path = input.unwrap_or(config.paths.input.as_path());
    let table = source::load_table(path).with_context(|| {
        format!(
            "could not load {}; run `clinic-attendance clean` first?",
            path.display()
        )
    })?;
    let records = table.records(config)?;
    println!("Loaded {} visits from {}.", records.len(), path.display());
    Ok((table, records))
}

fn run_individual(sink: &mut FileSink, config: &Config, table: &Table, records: &[VisitRecord]) {
    let mut job = ReportJob::new(sink, config, table, records, generated_at(config));
    job.individual_reports();
    print_outcome(&job.finish());
    println!("Individual analysis finished for all patients.");
}

fn run_consolidated(sink: &mut FileSink, config: &Config, table: &Table, records: &[VisitRecord]) {
    let mut job = ReportJob::new(sink, config, table, records, generated_at(config));
    let clinic = job.consolidated_report();
    println!(
        "Clinic no-show rate: {:.2}% ({} no-shows over {} valid visits).",
        clinic.no_show_rate(),
        clinic.no_show,
        clinic.valid_total()
    );
    print_outcome(&job.finish());
}

/// Source errors are reported and end the session without a failing exit
/// status.
fn run_menu(sink: &mut FileSink, config: &Config, input: Option<&Path>) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let choice = menu::prompt(&mut stdin.lock(), &mut std::io::stdout())?;

    let run = |sink: &mut FileSink, choice: MenuChoice| -> anyhow::Result<()> {
        let (table, records) = load_records(config, input)?;
        match choice {
            MenuChoice::Individual => run_individual(sink, config, &table, &records),
            MenuChoice::Consolidated => run_consolidated(sink, config, &table, &records),
            MenuChoice::Exit => {}
        }
        Ok(())
    };

    match choice {
        MenuChoice::Exit => println!("Exiting."),
        choice => {
            if let Err(err) = run(sink, choice) {
                error!("{err:#}");
                eprintln!("Error: {err:#}");
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &RunSummary) {
    println!(
        "{} artifacts written, {} failed.",
        outcome.written, outcome.failed
    );
    if !outcome.skipped_patients.is_empty() {
        println!("Skipped patients: {}", outcome.skipped_patients.join(", "));
    }
}
