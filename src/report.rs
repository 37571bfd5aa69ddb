//! Read-only KPI projections over the committed warehouse, rendered as SVG
//! charts plus a markdown digest.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::chart::{self, Labels};
use crate::error::{EtlError, Result};
use crate::models::{CategoryHires, CountryYearHires, TechnologyScores, YearHires};

pub const TECH_CHART: &str = "kpi_tech_top12.svg";
pub const YEAR_CHART: &str = "kpi_year.svg";
pub const SENIORITY_CHART: &str = "kpi_seniority.svg";
pub const COUNTRY_YEAR_CHART: &str = "kpi_country_year_grouped.svg";
pub const HIRE_RATE_CHART: &str = "kpi_hire_rate.svg";
pub const AVG_CODE_CHART: &str = "kpi_avg_code_score_top10.svg";
pub const AVG_TECH_CHART: &str = "kpi_avg_tech_score_top10.svg";
pub const DIGEST: &str = "kpi_report.md";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kpis {
    pub by_technology: Vec<CategoryHires>,
    pub by_year: Vec<YearHires>,
    pub by_seniority: Vec<CategoryHires>,
    pub by_country_year: Vec<CountryYearHires>,
    pub hire_rate_pct: Option<f64>,
    pub avg_scores: Vec<TechnologyScores>,
}

pub async fn fetch_kpis(pool: &SqlitePool, countries: &[String]) -> Result<Kpis> {
    let by_technology = sqlx::query_as::<_, CategoryHires>(
        r#"
        SELECT t.technology AS label, SUM(f.hired) AS hires
        FROM FactHiring f
        JOIN DimTechnology t ON f.technology_id = t.technology_id
        GROUP BY t.technology
        ORDER BY hires DESC, t.technology
        LIMIT 12
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_year = sqlx::query_as::<_, YearHires>(
        r#"
        SELECT d.year AS year, SUM(f.hired) AS hires
        FROM FactHiring f
        JOIN DimDate d ON f.date_id = d.date_id
        GROUP BY d.year
        ORDER BY d.year
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_seniority = sqlx::query_as::<_, CategoryHires>(
        r#"
        SELECT s.seniority AS label, SUM(f.hired) AS hires
        FROM FactHiring f
        JOIN DimSeniority s ON f.seniority_id = s.seniority_id
        GROUP BY s.seniority
        ORDER BY hires DESC, s.seniority
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_country_year = fetch_country_year(pool, countries).await?;

    let hire_rate_pct: Option<f64> =
        sqlx::query_scalar("SELECT ROUND(AVG(hired) * 100, 2) FROM FactHiring")
            .fetch_one(pool)
            .await?;

    let avg_scores = sqlx::query_as::<_, TechnologyScores>(
        r#"
        SELECT t.technology AS technology,
               ROUND(AVG(f.code_score), 2) AS avg_code_score,
               ROUND(AVG(f.tech_score), 2) AS avg_tech_score
        FROM FactHiring f
        JOIN DimTechnology t ON f.technology_id = t.technology_id
        GROUP BY t.technology
        ORDER BY avg_code_score DESC, t.technology
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Kpis {
        by_technology,
        by_year,
        by_seniority,
        by_country_year,
        hire_rate_pct,
        avg_scores,
    })
}

async fn fetch_country_year(
    pool: &SqlitePool,
    countries: &[String],
) -> Result<Vec<CountryYearHires>> {
    if countries.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT c.country AS country, d.year AS year, SUM(f.hired) AS hires \
         FROM FactHiring f \
         JOIN DimCountry c ON f.country_id = c.country_id \
         JOIN DimDate d ON f.date_id = d.date_id \
         WHERE c.country IN (",
    );
    let mut separated = builder.separated(", ");
    for country in countries {
        separated.push_bind(country.as_str());
    }
    separated.push_unseparated(") GROUP BY c.country, d.year ORDER BY d.year, c.country");

    let rows = builder
        .build_query_as::<CountryYearHires>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Year × country grid of hires. Countries are sorted by name, missing cells are 0.
pub fn pivot_country_year(rows: &[CountryYearHires]) -> (Vec<String>, Vec<(String, Vec<f64>)>) {
    let years: BTreeSet<i64> = rows.iter().map(|row| row.year).collect();
    let mut grid: BTreeMap<&str, BTreeMap<i64, i64>> = BTreeMap::new();
    for row in rows {
        *grid
            .entry(row.country.as_str())
            .or_default()
            .entry(row.year)
            .or_default() += row.hires;
    }

    let series = grid
        .into_iter()
        .map(|(country, by_year)| {
            let values = years
                .iter()
                .map(|year| by_year.get(year).copied().unwrap_or(0) as f64)
                .collect();
            (country.to_string(), values)
        })
        .collect();

    (years.iter().map(i64::to_string).collect(), series)
}

fn hires_points(rows: &[CategoryHires]) -> Vec<(String, f64)> {
    rows.iter()
        .map(|row| (row.label.clone(), row.hires as f64))
        .collect()
}

fn score_points(
    rows: &[TechnologyScores],
    pick: impl Fn(&TechnologyScores) -> Option<f64>,
) -> Vec<(String, f64)> {
    rows.iter()
        .map(|row| (row.technology.clone(), pick(row).unwrap_or(0.0)))
        .collect()
}

/// Renders every chart, keyed by its fixed file name.
pub fn render_charts(kpis: &Kpis) -> Vec<(&'static str, String)> {
    let mut charts = Vec::new();

    charts.push((
        TECH_CHART,
        chart::bar_chart(
            Labels {
                title: "Hires by Technology (Top 12)",
                x: "technology",
                y: "hires",
            },
            &hires_points(&kpis.by_technology),
            true,
        ),
    ));

    let years: Vec<(String, f64)> = kpis
        .by_year
        .iter()
        .map(|row| (row.year.to_string(), row.hires as f64))
        .collect();
    charts.push((
        YEAR_CHART,
        chart::line_chart(
            Labels {
                title: "Hires by Year",
                x: "year",
                y: "hires",
            },
            &years,
        ),
    ));

    charts.push((
        SENIORITY_CHART,
        chart::bar_chart(
            Labels {
                title: "Hires by Seniority",
                x: "seniority",
                y: "hires",
            },
            &hires_points(&kpis.by_seniority),
            true,
        ),
    ));

    let (year_labels, series) = pivot_country_year(&kpis.by_country_year);
    charts.push((
        COUNTRY_YEAR_CHART,
        chart::grouped_bar_chart(
            Labels {
                title: "Hires by Year (Grouped by Country)",
                x: "Year",
                y: "Hires",
            },
            &year_labels,
            &series,
        ),
    ));

    let rate: Vec<(String, f64)> = kpis
        .hire_rate_pct
        .map(|pct| vec![("Hire Rate %".to_string(), pct)])
        .unwrap_or_default();
    charts.push((
        HIRE_RATE_CHART,
        chart::bar_chart(
            Labels {
                title: "Global Hire Rate (%)",
                x: "",
                y: "",
            },
            &rate,
            false,
        ),
    ));

    charts.push((
        AVG_CODE_CHART,
        chart::bar_chart(
            Labels {
                title: "Avg. Code Score by Technology (Top 10)",
                x: "technology",
                y: "avg_code_score",
            },
            &score_points(&kpis.avg_scores, |row| row.avg_code_score),
            true,
        ),
    ));

    let mut by_tech_score = kpis.avg_scores.clone();
    by_tech_score.sort_by(|a, b| {
        b.avg_tech_score
            .partial_cmp(&a.avg_tech_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    charts.push((
        AVG_TECH_CHART,
        chart::bar_chart(
            Labels {
                title: "Avg. Tech Score by Technology (Top 10)",
                x: "technology",
                y: "avg_tech_score",
            },
            &score_points(&by_tech_score, |row| row.avg_tech_score),
            true,
        ),
    ));

    charts
}

fn fmt_score(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "n/a".to_string())
}

pub fn build_report(kpis: &Kpis) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Hiring KPI Report");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Global hire rate: {}",
        kpis.hire_rate_pct
            .map(|pct| format!("{pct:.2}%"))
            .unwrap_or_else(|| "n/a (no facts)".to_string())
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hires by Technology (Top 12)");
    if kpis.by_technology.is_empty() {
        let _ = writeln!(output, "No hiring facts recorded.");
    } else {
        for row in &kpis.by_technology {
            let _ = writeln!(output, "- {}: {}", row.label, row.hires);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hires by Year");
    if kpis.by_year.is_empty() {
        let _ = writeln!(output, "No hiring facts recorded.");
    } else {
        for row in &kpis.by_year {
            let _ = writeln!(output, "- {}: {}", row.year, row.hires);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hires by Seniority");
    if kpis.by_seniority.is_empty() {
        let _ = writeln!(output, "No hiring facts recorded.");
    } else {
        for row in &kpis.by_seniority {
            let _ = writeln!(output, "- {}: {}", row.label, row.hires);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hires by Country and Year");
    if kpis.by_country_year.is_empty() {
        let _ = writeln!(output, "No hires for the selected countries.");
    } else {
        for row in &kpis.by_country_year {
            let _ = writeln!(output, "- {} {}: {}", row.year, row.country, row.hires);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Scores by Technology (Top 10)");
    if kpis.avg_scores.is_empty() {
        let _ = writeln!(output, "No scores recorded.");
    } else {
        for row in &kpis.avg_scores {
            let _ = writeln!(
                output,
                "- {}: code {} / tech {}",
                row.technology,
                fmt_score(row.avg_code_score),
                fmt_score(row.avg_tech_score)
            );
        }
    }

    output
}

/// Queries the warehouse and writes every chart plus the digest into `out_dir`.
pub async fn generate(
    pool: &SqlitePool,
    out_dir: &Path,
    countries: &[String],
) -> Result<Vec<PathBuf>> {
    let kpis = fetch_kpis(pool, countries).await?;

    std::fs::create_dir_all(out_dir).map_err(|source| EtlError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    let mut files = render_charts(&kpis);
    files.push((DIGEST, build_report(&kpis)));

    for (name, contents) in files {
        let path = out_dir.join(name);
        std::fs::write(&path, contents).map_err(|source| EtlError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    info!(dir = %out_dir.display(), files = written.len(), "report written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cy(country: &str, year: i64, hires: i64) -> CountryYearHires {
        CountryYearHires {
            country: country.to_string(),
            year,
            hires,
        }
    }

    #[test]
    fn pivot_fills_missing_cells_with_zero() {
        let rows = vec![
            cy("Ecuador", 2019, 2),
            cy("Brazil", 2020, 5),
            cy("Ecuador", 2020, 1),
        ];
        let (years, series) = pivot_country_year(&rows);

        assert_eq!(years, vec!["2019".to_string(), "2020".to_string()]);
        assert_eq!(series[0], ("Brazil".to_string(), vec![0.0, 5.0]));
        assert_eq!(series[1], ("Ecuador".to_string(), vec![2.0, 1.0]));
    }

    #[test]
    fn empty_kpis_still_render_every_chart() {
        let charts = render_charts(&Kpis::default());
        assert_eq!(charts.len(), 7);
        assert!(charts.iter().all(|(_, svg)| svg.contains("No data")));
    }

    #[test]
    fn report_lists_sections_and_handles_missing_rate() {
        let kpis = Kpis {
            by_technology: vec![CategoryHires {
                label: "Rust".to_string(),
                hires: 4,
            }],
            avg_scores: vec![TechnologyScores {
                technology: "Rust".to_string(),
                avg_code_score: Some(7.5),
                avg_tech_score: None,
            }],
            ..Kpis::default()
        };

        let report = build_report(&kpis);
        assert!(report.contains("# Hiring KPI Report"));
        assert!(report.contains("n/a (no facts)"));
        assert!(report.contains("- Rust: 4"));
        assert!(report.contains("code 7.50 / tech n/a"));
        assert!(report.contains("## Hires by Year\nNo hiring facts recorded."));
    }
}
