use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// One untrusted input line, holding the columns the warehouse is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingRecord {
    pub country: String,
    pub seniority: String,
    pub technology: String,
    pub application_date: String,
    pub code_challenge_score: String,
    pub technical_interview_score: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub full_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
    pub date_id: i64,
    pub country_id: i64,
    pub seniority_id: i64,
    pub technology_id: i64,
    pub hired: i64,
    pub code_score: Option<i64>,
    pub tech_score: Option<i64>,
}

/// Post-build state of the warehouse, reported to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub staging: i64,
    pub dim_date: i64,
    pub dim_country: i64,
    pub dim_seniority: i64,
    pub dim_technology: i64,
    pub fact_hiring: i64,
    pub dropped_records: usize,
    pub null_scores: usize,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CategoryHires {
    pub label: String,
    pub hires: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct YearHires {
    pub year: i64,
    pub hires: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CountryYearHires {
    pub country: String,
    pub year: i64,
    pub hires: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TechnologyScores {
    pub technology: String,
    pub avg_code_score: Option<f64>,
    pub avg_tech_score: Option<f64>,
}
