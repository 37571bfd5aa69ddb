use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use hiring_warehouse::config::{self, AppConfig};
use hiring_warehouse::db::Warehouse;
use hiring_warehouse::models::RunSummary;
use hiring_warehouse::{pipeline, report, telemetry};

#[derive(Parser)]
#[command(name = "hiring-warehouse")]
#[command(
    about = "Builds a hiring star schema from a candidate export and renders KPI charts",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the warehouse from the candidate CSV
    Build {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Single-character field delimiter (use \t for tabs)
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Render KPI charts and the markdown digest from the current warehouse
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rebuild, then report
    Run {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print row counts of the current warehouse
    Summary {
        #[arg(long)]
        json: bool,
    },
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", pipeline::format_summary(summary));
    }
    Ok(())
}

async fn build(
    warehouse: &Warehouse,
    config: &AppConfig,
    csv: Option<PathBuf>,
    delimiter: Option<String>,
) -> anyhow::Result<RunSummary> {
    let csv = csv.unwrap_or_else(|| config.csv_path.clone());
    let delimiter = match delimiter {
        Some(value) => config::parse_delimiter(&value)?,
        None => config.delimiter,
    };

    pipeline::run(warehouse, &csv, delimiter)
        .await
        .with_context(|| format!("failed to build warehouse from {}", csv.display()))
}

async fn render(
    warehouse: &Warehouse,
    config: &AppConfig,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let out = out.unwrap_or_else(|| config.visuals_dir.clone());
    let written = report::generate(warehouse.pool(), &out, &config.report_countries)
        .await
        .context("failed to render KPI report")?;
    println!("{} files written to {}.", written.len(), out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("invalid configuration")?;
    telemetry::init(&config)?;

    let warehouse = Warehouse::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open warehouse at {}", config.database_url))?;

    match cli.command {
        Commands::Build {
            csv,
            delimiter,
            json,
        } => {
            let summary = build(&warehouse, &config, csv, delimiter).await?;
            if !json {
                println!("Warehouse ready at {}.", config.database_url);
            }
            print_summary(&summary, json)?;
        }
        Commands::Report { out } => {
            render(&warehouse, &config, out).await?;
        }
        Commands::Run {
            csv,
            delimiter,
            out,
        } => {
            let summary = build(&warehouse, &config, csv, delimiter).await?;
            println!("Warehouse ready at {}.", config.database_url);
            print_summary(&summary, false)?;
            render(&warehouse, &config, out).await?;
        }
        Commands::Summary { json } => {
            let summary = warehouse
                .row_counts()
                .await
                .context("warehouse has not been built yet")?;
            print_summary(&summary, json)?;
        }
    }

    warehouse.close().await;
    Ok(())
}
