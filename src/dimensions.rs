//! Dimension builder: one parameterised "distinct non-empty values of column X"
//! operation, applied to country, seniority, technology and application date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Row, Sqlite, SqliteConnection};
use tracing::debug;

use crate::dates;
use crate::db::{self, quote_ident, BuildContext};
use crate::error::{EtlError, Result};
use crate::loader;

/// Where a dimension comes from and how it is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    pub table: &'static str,
    pub id_column: &'static str,
    pub key_column: &'static str,
    pub source_column: &'static str,
}

pub const COUNTRY: DimensionSpec = DimensionSpec {
    table: db::DIM_COUNTRY,
    id_column: "country_id",
    key_column: "country",
    source_column: loader::COUNTRY,
};

pub const SENIORITY: DimensionSpec = DimensionSpec {
    table: db::DIM_SENIORITY,
    id_column: "seniority_id",
    key_column: "seniority",
    source_column: loader::SENIORITY,
};

pub const TECHNOLOGY: DimensionSpec = DimensionSpec {
    table: db::DIM_TECHNOLOGY,
    id_column: "technology_id",
    key_column: "technology",
    source_column: loader::TECHNOLOGY,
};

pub const DATE: DimensionSpec = DimensionSpec {
    table: db::DIM_DATE,
    id_column: "date_id",
    key_column: "full_date",
    source_column: loader::APPLICATION_DATE,
};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Natural key of a dimension: how a raw staging cell becomes a key and how
/// the key (plus any derived columns) is written.
pub trait DimensionKey: Ord + Clone + Send + 'static {
    const KEY_TYPE: &'static str;
    /// Derived columns stored after the natural key, as `(name, type)`.
    const EXTRA_COLUMNS: &'static [(&'static str, &'static str)];

    fn normalize(raw: &str) -> Option<Self>;

    fn bind(self, query: SqliteQuery<'_>) -> SqliteQuery<'_>;
}

impl DimensionKey for String {
    const KEY_TYPE: &'static str = "TEXT";
    const EXTRA_COLUMNS: &'static [(&'static str, &'static str)] = &[];

    fn normalize(raw: &str) -> Option<Self> {
        let value = raw.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn bind(self, query: SqliteQuery<'_>) -> SqliteQuery<'_> {
        query.bind(self)
    }
}

impl DimensionKey for NaiveDate {
    const KEY_TYPE: &'static str = "TEXT";
    const EXTRA_COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("year", "INTEGER NOT NULL"),
        ("month", "INTEGER NOT NULL"),
        ("day", "INTEGER NOT NULL"),
    ];

    fn normalize(raw: &str) -> Option<Self> {
        dates::parse_application_date(raw)
    }

    fn bind(self, query: SqliteQuery<'_>) -> SqliteQuery<'_> {
        let parts = dates::date_parts(self);
        query
            .bind(parts.full_date)
            .bind(i64::from(parts.year))
            .bind(i64::from(parts.month))
            .bind(i64::from(parts.day))
    }
}

/// In-memory view of a built dimension: natural key to surrogate id.
#[derive(Debug, Clone)]
pub struct Dimension<K> {
    ids: BTreeMap<K, i64>,
}

impl<K: DimensionKey> Dimension<K> {
    pub fn new(ids: BTreeMap<K, i64>) -> Self {
        Self { ids }
    }

    /// Surrogate id for a raw staging cell, if it normalises to a known key.
    pub fn resolve(&self, raw: &str) -> Option<i64> {
        let key = K::normalize(raw)?;
        self.ids.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Collapses raw cells into the sorted set of distinct, admissible keys.
pub fn distinct_keys<K, I, S>(raw_values: I) -> BTreeSet<K>
where
    K: DimensionKey,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw_values
        .into_iter()
        .filter_map(|raw| K::normalize(raw.as_ref()))
        .collect()
}

/// Drops, recreates and fills one dimension table from the staged rows.
pub async fn build_dimension<K: DimensionKey>(
    ctx: &mut BuildContext,
    spec: DimensionSpec,
) -> Result<Dimension<K>> {
    let ids = populate::<K>(ctx.conn(), &spec)
        .await
        .map_err(|source| EtlError::DimensionBuild {
            table: spec.table,
            source,
        })?;

    debug!(table = spec.table, rows = ids.len(), "dimension built");
    Ok(Dimension::new(ids))
}

async fn populate<K: DimensionKey>(
    conn: &mut SqliteConnection,
    spec: &DimensionSpec,
) -> std::result::Result<BTreeMap<K, i64>, sqlx::Error> {
    let table = quote_ident(spec.table);
    let source_sql = format!(
        "SELECT DISTINCT {} FROM {}",
        quote_ident(spec.source_column),
        quote_ident(db::STAGING_TABLE)
    );
    let raw: Vec<Option<String>> = sqlx::query_scalar(&source_sql)
        .fetch_all(&mut *conn)
        .await?;
    let keys: BTreeSet<K> = distinct_keys(raw.iter().flatten());

    let mut ddl = vec![
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", spec.id_column),
        format!("{} {} NOT NULL UNIQUE", spec.key_column, K::KEY_TYPE),
    ];
    let mut insert_columns = vec![spec.key_column];
    for (name, column_type) in K::EXTRA_COLUMNS {
        ddl.push(format!("{name} {column_type}"));
        insert_columns.push(*name);
    }

    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!("CREATE TABLE {table} ({})", ddl.join(", ")))
        .execute(&mut *conn)
        .await?;

    let placeholders = vec!["?"; insert_columns.len()].join(", ");
    let insert_sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders}) RETURNING {}",
        insert_columns.join(", "),
        spec.id_column
    );

    let mut ids = BTreeMap::new();
    for key in keys {
        let row = key
            .clone()
            .bind(sqlx::query(&insert_sql))
            .fetch_one(&mut *conn)
            .await?;
        ids.insert(key, row.try_get::<i64, _>(0)?);
    }

    Ok(ids)
}

/// The four dimensions of one run.
#[derive(Debug, Clone)]
pub struct Dimensions {
    pub date: Dimension<NaiveDate>,
    pub country: Dimension<String>,
    pub seniority: Dimension<String>,
    pub technology: Dimension<String>,
}

impl Dimensions {
    pub async fn build(ctx: &mut BuildContext) -> Result<Self> {
        Ok(Self {
            country: build_dimension(ctx, COUNTRY).await?,
            seniority: build_dimension(ctx, SENIORITY).await?,
            technology: build_dimension(ctx, TECHNOLOGY).await?,
            date: build_dimension(ctx, DATE).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Warehouse;
    use crate::loader::StagingTable;

    #[test]
    fn category_keys_are_trimmed_deduplicated_and_non_empty() {
        let raw = ["Brazil", " Brazil ", "", "   ", "\t", "Chile"];
        let keys: BTreeSet<String> = distinct_keys(raw);
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["Brazil".to_string(), "Chile".to_string()]
        );
    }

    #[test]
    fn date_keys_collapse_time_of_day_and_skip_garbage() {
        let keys: BTreeSet<NaiveDate> = distinct_keys([
            "2021-03-04 09:00:00",
            "2021-03-04 17:45:10",
            "2021-03-04",
            "not a date",
            "",
        ]);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn resolve_normalises_the_raw_cell_first() {
        let mut ids = BTreeMap::new();
        ids.insert("Rust".to_string(), 3);
        let dimension = Dimension::new(ids);

        assert_eq!(dimension.resolve("  Rust "), Some(3));
        assert_eq!(dimension.resolve("rust"), None);
        assert_eq!(dimension.resolve(""), None);
    }

    #[tokio::test]
    async fn builds_all_four_dimensions_from_staging() {
        let warehouse = Warehouse::connect("sqlite::memory:").await.unwrap();
        let staged = StagingTable {
            headers: loader::REQUIRED_COLUMNS.iter().map(|h| h.to_string()).collect(),
            rows: vec![
                vec!["Brazil", "Senior", "Rust", "2021-03-04 09:00:00", "7", "7"],
                vec![" Brazil", "Senior", "Go", "2021-03-04 18:00:00", "1", "2"],
                vec!["", "Junior", "", "garbage", "9", "9"],
            ]
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect(),
        };

        let mut ctx = warehouse.begin_rebuild().await.unwrap();
        ctx.reset_schema().await.unwrap();
        ctx.stage(&staged).await.unwrap();
        let dims = Dimensions::build(&mut ctx).await.unwrap();
        ctx.commit().await.unwrap();

        assert_eq!(dims.country.len(), 1);
        assert_eq!(dims.seniority.len(), 2);
        assert_eq!(dims.technology.len(), 2);
        assert_eq!(dims.date.len(), 1);

        let (year, month, day): (i64, i64, i64) =
            sqlx::query_as("SELECT year, month, day FROM DimDate")
                .fetch_one(warehouse.pool())
                .await
                .unwrap();
        assert_eq!((year, month, day), (2021, 3, 4));

        let stored: Vec<String> = sqlx::query_scalar("SELECT country FROM DimCountry")
            .fetch_all(warehouse.pool())
            .await
            .unwrap();
        assert_eq!(stored, vec!["Brazil".to_string()]);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_as_dimension_build_error() {
        let warehouse = Warehouse::connect("sqlite::memory:").await.unwrap();
        let mut ctx = warehouse.begin_rebuild().await.unwrap();
        ctx.reset_schema().await.unwrap();

        // No staging table exists, so reading the source column fails.
        let result = build_dimension::<String>(&mut ctx, COUNTRY).await;
        match result {
            Err(EtlError::DimensionBuild { table, .. }) => assert_eq!(table, "DimCountry"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
