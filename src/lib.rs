//! Star-schema warehouse for candidate hiring exports.
//!
//! A delimited export is staged verbatim, four dimensions (country, seniority,
//! technology, application date) are derived from it, and `FactHiring` joins
//! them with the hire decision. Every build replaces the previous warehouse
//! in one transaction. [`report`] projects KPIs from the committed tables.

pub mod chart;
pub mod config;
pub mod dates;
pub mod db;
pub mod dimensions;
pub mod error;
pub mod facts;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use error::{EtlError, Result};
