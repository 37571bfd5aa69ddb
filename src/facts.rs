//! Fact deriver: resolves staged rows against the four dimensions and applies
//! the hire rule.
//!
//! Score cells are coerced like a SQL integer cast on numeric text: integers
//! parse as-is, decimals truncate toward zero. Anything else becomes NULL and
//! the record is kept with `hired = 0`.

use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, warn};

use crate::db::{self, quote_ident, BuildContext};
use crate::dimensions::{self, Dimensions};
use crate::error::Result;
use crate::models::{FactRow, StagingRecord};

pub const HIRE_THRESHOLD: i64 = 7;

// Seven binds per row keeps each statement under SQLite's parameter limit.
const ROWS_PER_STATEMENT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactOutcome {
    pub rows: Vec<FactRow>,
    /// Staged records that failed to resolve against at least one dimension.
    pub dropped: usize,
    /// Score cells that coerced to NULL.
    pub null_scores: usize,
}

pub fn coerce_score(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(score) = value.parse::<i64>() {
        return Some(score);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|score| score.is_finite() && score.abs() < i64::MAX as f64)
        .map(|score| score.trunc() as i64)
}

/// Hired only when both scores are present and meet the threshold.
pub fn is_hired(code_score: Option<i64>, tech_score: Option<i64>) -> bool {
    matches!(
        (code_score, tech_score),
        (Some(code), Some(tech)) if code >= HIRE_THRESHOLD && tech >= HIRE_THRESHOLD
    )
}

/// Inner-join semantics: a record missing any dimension key contributes no fact.
pub fn derive_facts(records: &[StagingRecord], dims: &Dimensions) -> FactOutcome {
    let mut outcome = FactOutcome::default();

    for record in records {
        let keys = (
            dims.date.resolve(&record.application_date),
            dims.country.resolve(&record.country),
            dims.seniority.resolve(&record.seniority),
            dims.technology.resolve(&record.technology),
        );
        let (Some(date), Some(country), Some(seniority), Some(technology)) = keys else {
            outcome.dropped += 1;
            continue;
        };

        let code_score = coerce_score(&record.code_challenge_score);
        let tech_score = coerce_score(&record.technical_interview_score);
        outcome.null_scores +=
            usize::from(code_score.is_none()) + usize::from(tech_score.is_none());

        outcome.rows.push(FactRow {
            date_id: date,
            country_id: country,
            seniority_id: seniority,
            technology_id: technology,
            hired: i64::from(is_hired(code_score, tech_score)),
            code_score,
            tech_score,
        });
    }

    outcome
}

pub fn fact_table_ddl() -> String {
    let reference = |spec: &dimensions::DimensionSpec| {
        format!(
            "FOREIGN KEY({id}) REFERENCES {table}({id})",
            id = spec.id_column,
            table = quote_ident(spec.table)
        )
    };

    format!(
        "CREATE TABLE {} (\n\
             fact_id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
             date_id INTEGER NOT NULL,\n\
             country_id INTEGER NOT NULL,\n\
             seniority_id INTEGER NOT NULL,\n\
             technology_id INTEGER NOT NULL,\n\
             hired INTEGER NOT NULL CHECK (hired IN (0, 1)),\n\
             code_score INTEGER,\n\
             tech_score INTEGER,\n\
             {},\n\
             {},\n\
             {},\n\
             {}\n\
         )",
        quote_ident(db::FACT_TABLE),
        reference(&dimensions::DATE),
        reference(&dimensions::COUNTRY),
        reference(&dimensions::SENIORITY),
        reference(&dimensions::TECHNOLOGY),
    )
}

/// Replaces the fact table with `rows`.
pub async fn write_facts(ctx: &mut BuildContext, rows: &[FactRow]) -> Result<()> {
    let table = quote_ident(db::FACT_TABLE);
    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(ctx.conn())
        .await?;
    sqlx::query(&fact_table_ddl()).execute(ctx.conn()).await?;

    let prefix = format!(
        "INSERT INTO {table} (date_id, country_id, seniority_id, technology_id, hired, code_score, tech_score) "
    );

    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(prefix.as_str());
        builder.push_values(chunk, |mut values, row| {
            values
                .push_bind(row.date_id)
                .push_bind(row.country_id)
                .push_bind(row.seniority_id)
                .push_bind(row.technology_id)
                .push_bind(row.hired)
                .push_bind(row.code_score)
                .push_bind(row.tech_score);
        });
        builder.build().execute(ctx.conn()).await?;
    }

    debug!(rows = rows.len(), "fact table written");
    Ok(())
}

/// Derives facts from the staged rows and persists them.
pub async fn build_facts(ctx: &mut BuildContext, dims: &Dimensions) -> Result<FactOutcome> {
    let records = ctx.fetch_staging().await?;
    let outcome = derive_facts(&records, dims);
    write_facts(ctx, &outcome.rows).await?;

    if outcome.dropped > 0 {
        warn!(
            dropped = outcome.dropped,
            staged = records.len(),
            "records without a country, seniority, technology or valid date were left out"
        );
    }
    if outcome.null_scores > 0 {
        warn!(
            cells = outcome.null_scores,
            "non-numeric scores stored as NULL"
        );
    }

    Ok(outcome)
}
