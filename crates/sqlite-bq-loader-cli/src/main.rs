//! sqlite-bq-loader CLI - load SQLite tables into BigQuery.

use clap::{Parser, Subcommand};
use sqlite_bq_loader::{Config, LoadError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-bq-loader")]
#[command(about = "Load SQLite tables into BigQuery, replacing prior contents")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, coerce, and load every configured table
    Run {
        /// Override the SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Override the BigQuery project
        #[arg(long)]
        project: Option<String>,

        /// Override the BigQuery dataset
        #[arg(long)]
        dataset: Option<String>,

        /// Dry run: read and coerce tables without contacting BigQuery
        #[arg(long)]
        dry_run: bool,
    },

    /// Test the SQLite file and the BigQuery dataset lookup
    HealthCheck,

    /// Print the effective configuration as YAML (secrets redacted)
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), LoadError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    }
    .resolve_env();

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", serde_yaml::to_string(&config.redacted())?);
        }

        Commands::Run {
            database,
            project,
            dataset,
            dry_run,
        } => {
            // Apply overrides
            if let Some(path) = database {
                config.source.path = path;
            }
            if let Some(project) = project {
                config.target.project = Some(project);
            }
            if let Some(dataset) = dataset {
                config.target.dataset = dataset;
            }
            config.validate()?;

            let orchestrator = if dry_run {
                Orchestrator::source_only(config).await?
            } else {
                Orchestrator::new(config).await?
            };
            let orchestrator = if cli.output_json {
                orchestrator
            } else {
                orchestrator.with_reporter(|event| println!("{}", event))
            };

            let result = orchestrator.run(dry_run).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!(
                    "\n{} {} tables, {} rows in {:.2}s (run {})",
                    if dry_run { "Dry run checked" } else { "Loaded" },
                    result.tables.len(),
                    if dry_run {
                        result.tables.iter().map(|t| t.rows_read).sum::<usize>()
                    } else {
                        result.rows_total
                    },
                    result.duration_seconds,
                    result.run_id
                );
            }
        }

        Commands::HealthCheck => {
            // A missing project or token is reported, not fatal.
            let orchestrator = match Orchestrator::new(config.clone()).await {
                Ok(o) => o,
                Err(LoadError::Config(msg)) => {
                    info!("BigQuery target unavailable: {}", msg);
                    Orchestrator::source_only(config).await?
                }
                Err(e) => return Err(e),
            };
            let result = orchestrator.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite {}): {}",
                    result.source,
                    if result.source_connected { "OK" } else { "FAILED" }
                );
                for t in &result.table_counts {
                    match (&t.rows, &t.error) {
                        (Some(rows), _) => println!("    {}: {} rows", t.table, rows),
                        (None, Some(err)) => println!("    {}: {}", t.table, err),
                        (None, None) => {}
                    }
                }
                println!(
                    "  Target (BigQuery): {}",
                    if result.target_connected { "OK" } else { "FAILED" }
                );
                match result.dataset_exists {
                    Some(true) => println!("    Dataset exists"),
                    Some(false) => println!("    Dataset missing (will be created on run)"),
                    None => {}
                }
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(LoadError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
