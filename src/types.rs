use crate::constants::*;
use crate::error::{PipelineError, Result};
use serde::Deserialize;

/// One CSV row as read from the source, before any typing. Only the
/// columns the pipeline needs are deserialized; the rest are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_last: Option<String>,
    #[serde(rename = "estimated_population_2019")]
    pub estimated_population: Option<String>,
    #[serde(rename = "last_available_confirmed")]
    pub confirmed: Option<String>,
    #[serde(rename = "last_available_deaths")]
    pub deaths: Option<String>,
}

/// A typed source record: one (city, reporting date) row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line in the source file, for diagnostics.
    pub line: u64,
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_last: bool,
    pub estimated_population: Option<u64>,
    pub confirmed: Option<u64>,
    pub deaths: Option<u64>,
}

impl RawRecord {
    pub fn from_row(row: RawRow, line: u64) -> Result<Self> {
        Ok(Self {
            line,
            city: non_empty(row.city),
            state: non_empty(row.state),
            is_last: parse_flag(row.is_last.as_deref(), SRC_IS_LAST, line)?,
            estimated_population: parse_count(
                row.estimated_population.as_deref(),
                SRC_POPULATION,
                line,
            )?,
            confirmed: parse_count(row.confirmed.as_deref(), SRC_CONFIRMED, line)?,
            deaths: parse_count(row.deaths.as_deref(), SRC_DEATHS, line)?,
        })
    }
}

/// The cleaned, persisted record: one row per city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityRecord {
    pub city: String,
    pub state: Option<String>,
    pub estimated_population: Option<u64>,
    pub confirmed_cases: Option<u64>,
    pub deaths: Option<u64>,
}

/// What the cleaner kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub raw_rows: usize,
    pub latest_rows: usize,
    pub missing_city: usize,
    pub duplicate_latest: usize,
    pub cities_without_latest: usize,
    pub cleaned_rows: usize,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(line: u64, column: &str, value: &str) -> PipelineError {
    PipelineError::InvalidValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Parse the "is latest" flag. Blank counts as false.
pub fn parse_flag(raw: Option<&str>, column: &str, line: u64) -> Result<bool> {
    let value = raw.map(str::trim).unwrap_or("");
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(invalid(line, column, value)),
    }
}

/// Parse a non-negative count. Accepts integral floats ("1234.0") since the
/// export writes some integer columns that way. Blank is `None`.
pub fn parse_count(raw: Option<&str>, column: &str, line: u64) -> Result<Option<u64>> {
    let value = raw.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(n) = value.parse::<u64>() {
        return Ok(Some(n));
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
            Ok(Some(f as u64))
        }
        _ => Err(invalid(line, column, value)),
    }
}
