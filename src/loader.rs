use crate::constants::REQUIRED_COLUMNS;
use crate::error::{PipelineError, Result};
use crate::types::{RawRecord, RawRow};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Read the source table from `path` into memory.
///
/// Fails with `SourceNotFound` before opening anything when the file is absent,
/// and with `MissingColumn` when the header lacks any required column.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_records(path: &Path, delimiter: char) -> Result<Vec<RawRecord>> {
    if !path.is_file() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| {
        PipelineError::Config(format!("delimiter '{delimiter}' is not a single byte"))
    })?;

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .from_path(path)?;

    let headers = rdr.headers()?.clone();
    check_required_columns(&headers)?;
    debug!("Header has {} columns", headers.len());

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: RawRow = record.deserialize(Some(&headers))?;
        records.push(RawRecord::from_row(row, line)?);
    }

    info!("Loaded {} raw rows", records.len());
    Ok(records)
}

fn check_required_columns(headers: &StringRecord) -> Result<()> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "city,city_ibge_code,date,estimated_population_2019,is_last,last_available_confirmed,last_available_deaths,place_type,state";

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let err = load_records(Path::new("/definitely/not/here/caso_full.csv"), ',').unwrap_err();
        match err {
            PipelineError::SourceNotFound { path } => {
                assert!(path.ends_with("caso_full.csv"));
            }
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn loads_rows_and_ignores_extra_columns() {
        let file = write_csv(&[
            HEADER,
            "São Paulo,3550308,2020-05-01,12252023,False,20000,1700,city,SP",
            "São Paulo,3550308,2020-05-02,12252023,True,21000,1800,city,SP",
            ",,2020-05-02,45919049.0,True,31000,2600,state,SP",
        ]);

        let records = load_records(file.path(), ',').unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].city.as_deref(), Some("São Paulo"));
        assert!(!records[0].is_last);
        assert_eq!(records[1].line, 3);
        assert!(records[1].is_last);
        assert_eq!(records[1].confirmed, Some(21000));
        assert_eq!(records[2].city, None);
        assert_eq!(records[2].estimated_population, Some(45919049));
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let file = write_csv(&[
            "city,state,is_last,estimated_population_2019,last_available_confirmed",
            "Campinas,SP,True,1204073,500",
        ]);
        let err = load_records(file.path(), ',').unwrap_err();
        match err {
            PipelineError::MissingColumn(column) => assert_eq!(column, "last_available_deaths"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn malformed_number_fails_with_line() {
        let file = write_csv(&[
            HEADER,
            "Campinas,3509502,2020-05-02,1204073,True,lots,30,city,SP",
        ]);
        match load_records(file.path(), ',').unwrap_err() {
            PipelineError::InvalidValue { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, "last_available_confirmed");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn honours_custom_delimiter() {
        let file = write_csv(&[
            "city;state;is_last;estimated_population_2019;last_available_confirmed;last_available_deaths",
            "Recife;PE;True;1645727;9000;700",
        ]);
        let records = load_records(file.path(), ';').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state.as_deref(), Some("PE"));
        assert_eq!(records[0].deaths, Some(700));
    }
}
