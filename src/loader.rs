//! Raw loader: reads the delimited export verbatim into a staging table.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{EtlError, Result};

pub const COUNTRY: &str = "Country";
pub const SENIORITY: &str = "Seniority";
pub const TECHNOLOGY: &str = "Technology";
pub const APPLICATION_DATE: &str = "Application Date";
pub const CODE_CHALLENGE_SCORE: &str = "Code Challenge Score";
pub const TECHNICAL_INTERVIEW_SCORE: &str = "Technical Interview Score";

pub const REQUIRED_COLUMNS: [&str; 6] = [
    COUNTRY,
    SENIORITY,
    TECHNOLOGY,
    APPLICATION_DATE,
    CODE_CHALLENGE_SCORE,
    TECHNICAL_INTERVIEW_SCORE,
];

/// Untyped mirror of the source file. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct StagingTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StagingTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn load_csv(path: &Path, delimiter: u8) -> Result<StagingTable> {
    let file = File::open(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_staging(file, delimiter)?;
    debug!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.len(),
        "source file staged in memory"
    );
    Ok(table)
}

/// Reads any delimited source. Cells are kept verbatim: no trimming, no coercion.
pub fn read_staging<R: std::io::Read>(source: R, delimiter: u8) -> Result<StagingTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    validate_headers(&headers)?;

    let width = headers.len();
    let mut rows = Vec::new();
    let mut ragged = 0usize;

    for result in reader.records() {
        let record = result?;
        if record.len() != width {
            ragged += 1;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if ragged > 0 {
        warn!(
            ragged,
            width,
            "rows with a field count different from the header were padded or truncated"
        );
    }

    Ok(StagingTable { headers, rows })
}

/// Rejects blank, duplicated or incomplete headers.
pub fn validate_headers(headers: &[String]) -> Result<()> {
    if headers.is_empty() || headers.iter().all(|header| header.trim().is_empty()) {
        return Err(EtlError::Schema(
            "header row is missing or empty".to_string(),
        ));
    }

    // SQLite column names are case-insensitive.
    let mut seen = HashSet::new();
    for header in headers {
        if header.trim().is_empty() {
            return Err(EtlError::Schema(
                "header row contains a blank column name".to_string(),
            ));
        }
        if !seen.insert(header.to_ascii_lowercase()) {
            return Err(EtlError::Schema(format!("duplicate column '{header}'")));
        }
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header == column))
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::Schema(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "First Name;Country;Seniority;Technology;Application Date;Code Challenge Score;Technical Interview Score";

    fn stage(body: &str) -> Result<StagingTable> {
        let input = format!("{HEADER}\n{body}");
        read_staging(input.as_bytes(), b';')
    }

    fn schema_message(result: Result<StagingTable>) -> String {
        match result {
            Err(EtlError::Schema(message)) => message,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn keeps_cells_verbatim() {
        let row = "Ana; Brazil ;Senior;Rust;2021-03-04 10:00:00;7;abc\n";
        let table = stage(row).unwrap();

        assert_eq!(table.headers.len(), 7);
        assert_eq!(table.len(), 1);
        let country = table.column_index(COUNTRY).unwrap();
        assert_eq!(table.rows[0][country], " Brazil ");
        assert_eq!(table.rows[0][6], "abc");
    }

    #[test]
    fn header_only_file_yields_no_rows() {
        let table = stage("").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn empty_input_is_a_schema_error() {
        let result = read_staging("".as_bytes(), b';');
        assert!(matches!(result, Err(EtlError::Schema(_))));
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let input = "Country;Seniority\nBrazil;Senior\n";
        let message = schema_message(read_staging(input.as_bytes(), b';'));
        assert!(message.contains("Technology"));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let input = format!("{HEADER};Country\n");
        let message = schema_message(read_staging(input.as_bytes(), b';'));
        assert!(message.contains("'Country'"));
    }

    #[test]
    fn columns_differing_only_in_case_are_duplicates() {
        let input = format!("{HEADER};country\n");
        let message = schema_message(read_staging(input.as_bytes(), b';'));
        assert!(message.contains("'country'"));
    }

    #[test]
    fn long_rows_are_truncated_to_the_header_width() {
        let row = "Ana;Brazil;Senior;Rust;2021-03-04;7;8;extra;more\n";
        let table = stage(row).unwrap();
        assert_eq!(table.rows[0].len(), 7);
        assert_eq!(table.rows[0][6], "8");
    }

    #[test]
    fn short_rows_are_padded_with_empty_cells() {
        let table = stage("Ana;Brazil;Senior\n").unwrap();
        assert_eq!(table.rows[0].len(), 7);
        assert_eq!(table.rows[0][6], "");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = Path::new("/definitely/not/here.csv");
        let result = load_csv(path, b';');
        assert!(matches!(result, Err(EtlError::Io { .. })));
    }
}
