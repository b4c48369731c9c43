use crate::types::{CityRecord, CleanReport, RawRecord};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Reduce raw rows to the latest snapshot per city.
///
/// Keeps rows flagged as latest, projects them onto `CityRecord` and drops rows
/// without a city. A city is keyed by (city, state); when the source flags more
/// than one latest row for the same key, the first one wins and the rest are
/// counted in `duplicate_latest`.
#[instrument(skip_all, fields(raw_rows = raw.len()))]
pub fn clean_records(raw: Vec<RawRecord>) -> (Vec<CityRecord>, CleanReport) {
    let mut report = CleanReport {
        raw_rows: raw.len(),
        ..CleanReport::default()
    };

    let mut seen_cities: HashSet<(String, Option<String>)> = HashSet::new();
    let mut latest_keys: HashSet<(String, Option<String>)> = HashSet::new();
    let mut cleaned = Vec::new();

    for record in raw {
        if let Some(city) = &record.city {
            seen_cities.insert((city.clone(), record.state.clone()));
        }
        if !record.is_last {
            continue;
        }
        report.latest_rows += 1;

        let Some(city) = record.city else {
            report.missing_city += 1;
            debug!(line = record.line, "Dropping latest row without city");
            continue;
        };

        let key = (city.clone(), record.state.clone());
        if !latest_keys.insert(key) {
            report.duplicate_latest += 1;
            warn!(
                line = record.line,
                city = %city,
                "City has more than one latest row; keeping the first"
            );
            continue;
        }

        cleaned.push(CityRecord {
            city,
            state: record.state,
            estimated_population: record.estimated_population,
            confirmed_cases: record.confirmed,
            deaths: record.deaths,
        });
    }

    report.cities_without_latest = seen_cities.difference(&latest_keys).count();
    if report.cities_without_latest > 0 {
        warn!(
            "{} cities have no latest row and are left out",
            report.cities_without_latest
        );
    }
    report.cleaned_rows = cleaned.len();

    info!(
        "Cleaned {} rows into {} cities ({} without city, {} duplicate latest)",
        report.raw_rows, report.cleaned_rows, report.missing_city, report.duplicate_latest
    );
    println!("Data loaded and cleaned.");
    println!("Total cities analysed: {}", report.cleaned_rows);

    (cleaned, report)
}
