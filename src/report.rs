//! Aggregates over the cleaned city table and their text rendering.

use crate::error::{PipelineError, Result};
use crate::types::CityRecord;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::warn;

/// Total deaths for one city name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityTotal {
    pub city: String,
    pub deaths: u64,
}

/// A city in the population ranking, with its death count alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationEntry {
    pub city: String,
    pub state: Option<String>,
    pub estimated_population: Option<u64>,
    pub deaths: Option<u64>,
}

/// A city picked as an extreme of confirmed cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityCases {
    pub city: String,
    pub state: Option<String>,
    pub confirmed_cases: u64,
}

/// Deaths summed per city name, largest first. Missing death counts add nothing.
/// The sort is stable, so tied cities keep the order in which they first appeared.
pub fn deaths_by_city(records: &[CityRecord]) -> Vec<CityTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<CityTotal> = Vec::new();

    for record in records {
        let deaths = record.deaths.unwrap_or(0);
        match index.get(record.city.as_str()) {
            Some(&i) => totals[i].deaths += deaths,
            None => {
                index.insert(record.city.as_str(), totals.len());
                totals.push(CityTotal {
                    city: record.city.clone(),
                    deaths,
                });
            }
        }
    }

    totals.sort_by(|a, b| b.deaths.cmp(&a.deaths));
    totals
}

/// Cities by estimated population, largest first; cities without an estimate go last.
pub fn population_ranking(records: &[CityRecord]) -> Vec<PopulationEntry> {
    let mut ranking: Vec<PopulationEntry> = records
        .iter()
        .map(|r| PopulationEntry {
            city: r.city.clone(),
            state: r.state.clone(),
            estimated_population: r.estimated_population,
            deaths: r.deaths,
        })
        .collect();

    // `None < Some(_)`, so reversing the comparison puts unknowns at the end.
    ranking.sort_by(|a, b| b.estimated_population.cmp(&a.estimated_population));
    ranking
}

/// The city with the most confirmed cases. First encountered wins ties.
pub fn max_confirmed(records: &[CityRecord]) -> Result<&CityRecord> {
    records
        .iter()
        .filter(|r| r.confirmed_cases.is_some())
        .fold(None, |best: Option<&CityRecord>, r| match best {
            Some(b) if b.confirmed_cases >= r.confirmed_cases => Some(b),
            _ => Some(r),
        })
        .ok_or_else(|| {
            PipelineError::EmptySelection("no city has a confirmed case count".to_string())
        })
}

/// The city with the fewest confirmed cases among those with at least one.
/// First encountered wins ties.
pub fn min_confirmed_positive(records: &[CityRecord]) -> Result<&CityRecord> {
    records
        .iter()
        .filter(|r| r.confirmed_cases.is_some_and(|c| c > 0))
        .min_by_key(|r| r.confirmed_cases)
        .ok_or_else(|| {
            PipelineError::EmptySelection("no city has at least one confirmed case".to_string())
        })
}

fn as_city_cases(record: &CityRecord) -> CityCases {
    CityCases {
        city: record.city.clone(),
        state: record.state.clone(),
        confirmed_cases: record.confirmed_cases.unwrap_or(0),
    }
}

/// The four aggregates over one cleaned table.
#[derive(Debug, Clone)]
pub struct Report {
    pub top_n: usize,
    pub deaths_by_city: Vec<CityTotal>,
    pub population_ranking: Vec<PopulationEntry>,
    pub max_confirmed: Option<CityCases>,
    pub min_confirmed: Option<CityCases>,
}

impl Report {
    /// Compute all aggregates. An extreme that has no candidate row is left as
    /// `None` and rendered as such instead of aborting the report.
    pub fn build(records: &[CityRecord], top_n: usize) -> Self {
        let max_confirmed = match max_confirmed(records) {
            Ok(r) => Some(as_city_cases(r)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        let min_confirmed = match min_confirmed_positive(records) {
            Ok(r) => Some(as_city_cases(r)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        Self {
            top_n,
            deaths_by_city: deaths_by_city(records),
            population_ranking: population_ranking(records),
            max_confirmed,
            min_confirmed,
        }
    }

    pub fn top_deaths(&self) -> &[CityTotal] {
        let n = self.top_n.min(self.deaths_by_city.len());
        &self.deaths_by_city[..n]
    }

    pub fn top_population(&self) -> &[PopulationEntry] {
        let n = self.top_n.min(self.population_ranking.len());
        &self.population_ranking[..n]
    }

    /// The report as printed to stdout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "\n--- ANALYSIS REPORT ---")?;

        writeln!(out, "\nDeaths by city (top {}):", self.top_n)?;
        let deaths = self.top_deaths();
        let width = name_width(deaths.iter().map(|t| t.city.as_str()));
        writeln!(out, "{:<width$}  {:>12}", "city", "deaths")?;
        for total in deaths {
            writeln!(
                out,
                "{:<width$}  {:>12}",
                total.city,
                format_count(total.deaths)
            )?;
        }

        writeln!(
            out,
            "\nEstimated population and total deaths (top {} most populous cities):",
            self.top_n
        )?;
        let ranking = self.top_population();
        let width = name_width(ranking.iter().map(|e| e.city.as_str()));
        writeln!(
            out,
            "{:<width$}  {:<5}  {:>20}  {:>12}",
            "city", "state", "estimated_population", "deaths"
        )?;
        for entry in ranking {
            writeln!(
                out,
                "{:<width$}  {:<5}  {:>20}  {:>12}",
                entry.city,
                entry.state.as_deref().unwrap_or("-"),
                format_optional(entry.estimated_population),
                format_optional(entry.deaths)
            )?;
        }

        match &self.max_confirmed {
            Some(c) => writeln!(
                out,
                "\nLargest city by confirmed cases: {} with {} cases.",
                c.city,
                format_count(c.confirmed_cases)
            )?,
            None => writeln!(out, "\nLargest city by confirmed cases: no data.")?,
        }
        match &self.min_confirmed {
            Some(c) => writeln!(
                out,
                "Smallest city by confirmed cases (at least 1 case): {} with {} cases.",
                c.city,
                format_count(c.confirmed_cases)
            )?,
            None => writeln!(
                out,
                "Smallest city by confirmed cases (at least 1 case): no city has a confirmed case."
            )?,
        }
        Ok(())
    }
}

// Padding uses char counts so accented names line up.
fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|n| n.chars().count()).max().unwrap_or(0).max(4)
}

fn format_optional(value: Option<u64>) -> String {
    value.map(format_count).unwrap_or_else(|| "-".to_string())
}

/// 1234567 -> "1,234,567"
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
