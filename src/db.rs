//! Warehouse store: a SQLite database rebuilt from scratch inside one transaction.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::loader::{
    StagingTable, APPLICATION_DATE, CODE_CHALLENGE_SCORE, COUNTRY, SENIORITY,
    TECHNICAL_INTERVIEW_SCORE, TECHNOLOGY,
};
use crate::models::{RunSummary, StagingRecord};

pub const STAGING_TABLE: &str = "stg_candidates_raw";
pub const FACT_TABLE: &str = "FactHiring";
pub const DIM_DATE: &str = "DimDate";
pub const DIM_COUNTRY: &str = "DimCountry";
pub const DIM_SENIORITY: &str = "DimSeniority";
pub const DIM_TECHNOLOGY: &str = "DimTechnology";

/// Children before parents so foreign keys never block a drop.
const DROP_ORDER: [&str; 6] = [
    FACT_TABLE,
    DIM_DATE,
    DIM_COUNTRY,
    DIM_SENIORITY,
    DIM_TECHNOLOGY,
    STAGING_TABLE,
];

// Stays well under SQLite's bound-parameter limit regardless of header width.
const MAX_BINDS_PER_STATEMENT: usize = 900;

/// Double-quotes an identifier for SQLite, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct Warehouse {
    pool: SqlitePool,
}

impl Warehouse {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Single writer: one connection also keeps `sqlite::memory:` databases alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens the transaction that owns one full rebuild.
    pub async fn begin_rebuild(&self) -> Result<BuildContext> {
        let tx = self.pool.begin().await?;
        Ok(BuildContext { tx })
    }

    /// Row counts of the committed warehouse tables.
    pub async fn row_counts(&self) -> Result<RunSummary> {
        let mut conn = self.pool.acquire().await?;
        Ok(RunSummary {
            staging: count_rows(&mut conn, STAGING_TABLE).await?,
            dim_date: count_rows(&mut conn, DIM_DATE).await?,
            dim_country: count_rows(&mut conn, DIM_COUNTRY).await?,
            dim_seniority: count_rows(&mut conn, DIM_SENIORITY).await?,
            dim_technology: count_rows(&mut conn, DIM_TECHNOLOGY).await?,
            fact_hiring: count_rows(&mut conn, FACT_TABLE).await?,
            ..RunSummary::default()
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn count_rows(conn: &mut SqliteConnection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(conn).await?;
    Ok(count)
}

/// State shared by the build steps of one run. Dropping it without
/// [`BuildContext::commit`] rolls the whole rebuild back.
pub struct BuildContext {
    tx: Transaction<'static, Sqlite>,
}

impl BuildContext {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn reset_schema(&mut self) -> Result<()> {
        for table in DROP_ORDER {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
            sqlx::query(&sql).execute(self.conn()).await?;
        }
        Ok(())
    }

    /// Recreates the staging table with one TEXT column per source header.
    pub async fn stage(&mut self, table: &StagingTable) -> Result<()> {
        let columns: Vec<String> = table.headers.iter().map(|h| quote_ident(h)).collect();
        let staging = quote_ident(STAGING_TABLE);

        sqlx::query(&format!("DROP TABLE IF EXISTS {staging}"))
            .execute(self.conn())
            .await?;
        let ddl = columns
            .iter()
            .map(|column| format!("{column} TEXT"))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!("CREATE TABLE {staging} ({ddl})"))
            .execute(self.conn())
            .await?;

        let rows_per_statement = (MAX_BINDS_PER_STATEMENT / columns.len().max(1)).max(1);
        let prefix = format!("INSERT INTO {staging} ({}) ", columns.join(", "));

        for chunk in table.rows.chunks(rows_per_statement) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(prefix.as_str());
            builder.push_values(chunk, |mut values, row| {
                for cell in row {
                    values.push_bind(cell.clone());
                }
            });
            builder.build().execute(self.conn()).await?;
        }

        debug!(rows = table.len(), "staging table loaded");
        Ok(())
    }

    /// Reads back the staged rows in insertion order, projecting the derivation columns.
    pub async fn fetch_staging(&mut self) -> Result<Vec<StagingRecord>> {
        let columns = [
            COUNTRY,
            SENIORITY,
            TECHNOLOGY,
            APPLICATION_DATE,
            CODE_CHALLENGE_SCORE,
            TECHNICAL_INTERVIEW_SCORE,
        ]
        .map(quote_ident)
        .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {} ORDER BY rowid",
            quote_ident(STAGING_TABLE)
        );

        let rows = sqlx::query(&sql).fetch_all(self.conn()).await?;
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let cell = |index: usize| -> Result<String> {
                let value: Option<String> = row.try_get(index)?;
                Ok(value.unwrap_or_default())
            };
            records.push(StagingRecord {
                country: cell(0)?,
                seniority: cell(1)?,
                technology: cell(2)?,
                application_date: cell(3)?,
                code_challenge_score: cell(4)?,
                technical_interview_score: cell(5)?,
            });
        }

        Ok(records)
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::REQUIRED_COLUMNS;

    fn table(headers: &[&str], rows: &[&[&str]]) -> StagingTable {
        StagingTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("Application Date"), "\"Application Date\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[tokio::test]
    async fn staging_round_trips_required_columns() {
        let warehouse = Warehouse::connect("sqlite::memory:").await.unwrap();
        let staged = table(
            &[
                "Email",
                COUNTRY,
                SENIORITY,
                TECHNOLOGY,
                APPLICATION_DATE,
                CODE_CHALLENGE_SCORE,
                TECHNICAL_INTERVIEW_SCORE,
            ],
            &[
                &["a@x", "Brazil", "Senior", "Rust", "2021-01-02", "8", "9"],
                &["b@x", "", " Lead ", "Go", "", "x", ""],
            ],
        );

        let mut ctx = warehouse.begin_rebuild().await.unwrap();
        ctx.reset_schema().await.unwrap();
        ctx.stage(&staged).await.unwrap();
        let records = ctx.fetch_staging().await.unwrap();
        ctx.commit().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].country, "Brazil");
        assert_eq!(records[1].seniority, " Lead ");
        assert_eq!(records[1].code_challenge_score, "x");
    }

    #[tokio::test]
    async fn staging_handles_more_rows_than_one_statement_binds() {
        let warehouse = Warehouse::connect("sqlite::memory:").await.unwrap();
        let row: &[&str] = &["Chile", "Junior", "Java", "2020-05-05", "1", "2"];
        let rows = vec![row; 500];
        let staged = table(&REQUIRED_COLUMNS, &rows);

        let mut ctx = warehouse.begin_rebuild().await.unwrap();
        ctx.stage(&staged).await.unwrap();
        assert_eq!(ctx.fetch_staging().await.unwrap().len(), 500);
    }
}
