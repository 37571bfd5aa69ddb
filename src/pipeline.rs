//! One full batch: load, stage, build dimensions, derive facts, commit.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::db::Warehouse;
use crate::dimensions::Dimensions;
use crate::error::Result;
use crate::facts;
use crate::loader::{self, StagingTable};
use crate::models::RunSummary;

/// Loads `csv_path` and rebuilds the warehouse from it. The source is read
/// before any table is touched, so an unreadable file leaves the store as is.
pub async fn run(warehouse: &Warehouse, csv_path: &Path, delimiter: u8) -> Result<RunSummary> {
    let table = loader::load_csv(csv_path, delimiter)?;
    info!(path = %csv_path.display(), rows = table.len(), "source loaded");
    rebuild(warehouse, &table).await
}

/// Replaces all warehouse tables inside a single transaction.
pub async fn rebuild(warehouse: &Warehouse, table: &StagingTable) -> Result<RunSummary> {
    loader::validate_headers(&table.headers)?;
    let run_id = Uuid::new_v4();
    let mut ctx = warehouse.begin_rebuild().await?;

    ctx.reset_schema().await?;
    ctx.stage(table).await?;
    let dims = Dimensions::build(&mut ctx).await?;
    info!(
        %run_id,
        dates = dims.date.len(),
        countries = dims.country.len(),
        seniorities = dims.seniority.len(),
        technologies = dims.technology.len(),
        "dimensions built"
    );

    let outcome = facts::build_facts(&mut ctx, &dims).await?;
    ctx.commit().await?;

    let summary = RunSummary {
        run_id: Some(run_id),
        dropped_records: outcome.dropped,
        null_scores: outcome.null_scores,
        ..warehouse.row_counts().await?
    };
    info!(
        %run_id,
        facts = summary.fact_hiring,
        dropped = summary.dropped_records,
        "warehouse committed"
    );
    Ok(summary)
}

/// Operator-facing rendering of a run summary.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut output = format!(
        "DimDate:{}  DimCountry:{}  DimSeniority:{}  DimTechnology:{}\nFactHiring:{}",
        summary.dim_date,
        summary.dim_country,
        summary.dim_seniority,
        summary.dim_technology,
        summary.fact_hiring
    );
    if summary.dropped_records > 0 || summary.null_scores > 0 {
        output.push_str(&format!(
            "\nstaged:{}  dropped:{}  null scores:{}",
            summary.staging, summary.dropped_records, summary.null_scores
        ));
    }
    output
}
