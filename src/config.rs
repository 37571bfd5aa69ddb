use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_COUNTRIES: &str = "United States,Brazil,Colombia,Ecuador";

/// Settings for one pipeline invocation, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub csv_path: PathBuf,
    pub delimiter: u8,
    pub visuals_dir: PathBuf,
    pub report_countries: Vec<String>,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = var_or("DATABASE_URL", "sqlite://dw_hiring.db");
        let csv_path = var_or("HIRING_CSV", "data/candidates.csv");
        let delimiter = parse_delimiter(&var_or("HIRING_DELIMITER", ";"))?;
        let visuals_dir = var_or("HIRING_VISUALS_DIR", "visuals");
        let countries = var_or("HIRING_REPORT_COUNTRIES", DEFAULT_COUNTRIES);
        let report_countries = parse_countries(&countries);
        let log_level = var_or("HIRING_LOG_LEVEL", "info");

        Ok(Self {
            database_url,
            csv_path: PathBuf::from(csv_path),
            delimiter,
            visuals_dir: PathBuf::from(visuals_dir),
            report_countries,
            log_level,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Accepts exactly one ASCII character, e.g. `;` or `,`. `\t` is accepted for tabs.
pub fn parse_delimiter(value: &str) -> Result<u8, ConfigError> {
    if value == "\\t" {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ConfigError::InvalidDelimiter(value.to_string())),
    }
}

pub fn parse_countries(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|country| !country.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("delimiter must be a single ASCII character, got '{0}'")]
    InvalidDelimiter(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "DATABASE_URL",
            "HIRING_CSV",
            "HIRING_DELIMITER",
            "HIRING_VISUALS_DIR",
            "HIRING_REPORT_COUNTRIES",
            "HIRING_LOG_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_semicolon_export() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();

        let config = AppConfig::load().expect("defaults load");
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.csv_path, PathBuf::from("data/candidates.csv"));
        assert_eq!(config.report_countries.len(), 4);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_multi_character_delimiter() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        env::set_var("HIRING_DELIMITER", ";;");

        let err = AppConfig::load().expect_err("two characters");
        match err {
            ConfigError::InvalidDelimiter(value) => assert_eq!(value, ";;"),
        }
        reset_env();
    }

    #[test]
    fn delimiter_accepts_escaped_tab() {
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn countries_are_trimmed_and_blank_entries_skipped() {
        assert_eq!(
            parse_countries(" Brazil ,, Ecuador"),
            vec!["Brazil".to_string(), "Ecuador".to_string()]
        );
    }
}
