use anyhow::Result;
use covid_city_report::config::{Backend, Config};
use covid_city_report::db::open_store;
use covid_city_report::error::PipelineError;
use covid_city_report::pipeline::Pipeline;
use covid_city_report::storage::InMemoryTableStore;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "city,city_ibge_code,date,epidemiological_week,estimated_population,estimated_population_2019,is_last,is_repeated,last_available_confirmed,last_available_deaths,order_for_place,place_type,state,new_confirmed,new_deaths";

fn write_dataset(path: &Path) -> Result<()> {
    let rows = [
        HEADER,
        // CityA: two snapshots, the second is the latest
        "CityA,1,2020-06-01,23,5000,5000,False,False,150,80,10,city,SP,5,1",
        "CityA,1,2020-06-02,23,5000,5000,True,False,200,100,11,city,SP,50,20",
        // CityB: latest only, no cases
        "CityB,2,2020-06-02,23,9000,9000,True,False,0,50,11,city,RJ,0,0",
        // CityC
        "CityC,3,2020-06-01,23,1000,1000,False,False,8,70,10,city,PE,1,0",
        "CityC,3,2020-06-02,23,1000,1000,True,False,10,75,11,city,PE,2,5",
        // state aggregate row: latest but no city
        ",35,2020-06-02,23,45919049,45919049,True,False,31000,2600,90,state,SP,900,40",
    ];
    fs::write(path, rows.join("\n") + "\n")?;
    Ok(())
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.path = dir.join("caso_full.csv");
    config.database.backend = Backend::Memory;
    config.charts.enabled = false;
    config
}

#[tokio::test]
async fn full_run_over_scenario_dataset() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(&dir.path().join("caso_full.csv"))?;
    let config = config_for(dir.path());
    let store = InMemoryTableStore::new();

    let result = Pipeline::run(&config, &store).await?;

    // cleaning
    assert_eq!(result.clean.raw_rows, 6);
    assert_eq!(result.clean.latest_rows, 4);
    assert_eq!(result.clean.missing_city, 1);
    assert_eq!(result.clean.cleaned_rows, 3);
    assert_eq!(result.rows_written, 3);

    // persisted table has one row per city, latest values only
    let table = store.table("casos_cidades").expect("table written");
    let cities: HashSet<_> = table.iter().map(|r| r.city.as_str()).collect();
    assert_eq!(cities.len(), table.len());
    let city_a = table.iter().find(|r| r.city == "CityA").unwrap();
    assert_eq!(city_a.deaths, Some(100));
    assert_eq!(city_a.confirmed_cases, Some(200));

    // aggregates
    let deaths: Vec<_> = result
        .report
        .top_deaths()
        .iter()
        .map(|t| t.city.as_str())
        .collect();
    assert_eq!(deaths, ["CityA", "CityC", "CityB"]);

    let population: Vec<_> = result
        .report
        .top_population()
        .iter()
        .map(|e| e.city.as_str())
        .collect();
    assert_eq!(population, ["CityB", "CityA", "CityC"]);

    let max = result.report.max_confirmed.as_ref().unwrap();
    assert_eq!((max.city.as_str(), max.confirmed_cases), ("CityA", 200));
    let min = result.report.min_confirmed.as_ref().unwrap();
    assert_eq!((min.city.as_str(), min.confirmed_cases), ("CityC", 10));

    assert!(result.charts.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_source_halts_before_any_database_write() -> Result<()> {
    let dir = tempdir()?;
    let config = config_for(dir.path());
    let store = InMemoryTableStore::new();

    let err = Pipeline::run(&config, &store).await.unwrap_err();

    assert!(matches!(err, PipelineError::SourceNotFound { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(err.user_message().contains("caso_full.csv"));
    assert_eq!(store.write_attempts(), 0);
    assert!(store.table("casos_cidades").is_none());
    Ok(())
}

#[tokio::test]
async fn database_failure_halts_before_reporting() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(&dir.path().join("caso_full.csv"))?;
    let mut config = config_for(dir.path());
    config.charts.enabled = true;
    config.charts.output_dir = dir.path().join("charts");
    let store = InMemoryTableStore::failing("Access denied for user 'root'@'localhost'");

    let err = Pipeline::run(&config, &store).await.unwrap_err();

    assert!(matches!(err, PipelineError::Persistence { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(err.user_message().contains("Access denied"));
    assert!(!dir.path().join("charts").exists());
    Ok(())
}

#[tokio::test]
async fn charts_are_written_after_a_successful_run() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(&dir.path().join("caso_full.csv"))?;
    let mut config = config_for(dir.path());
    config.charts.enabled = true;
    config.charts.output_dir = dir.path().join("charts");
    config.charts.width = 800;
    config.charts.height = 600;
    let store = InMemoryTableStore::new();

    let result = Pipeline::run(&config, &store).await?;

    assert_eq!(
        result.charts,
        [
            dir.path().join("charts/grafico_mortes_por_cidade.png"),
            dir.path().join("charts/grafico_populacao_por_cidade.png"),
        ]
    );
    for path in &result.charts {
        assert!(fs::metadata(path)?.len() > 0, "{} is empty", path.display());
    }
    Ok(())
}

#[tokio::test]
async fn missing_source_is_reported_before_database_settings() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config_for(dir.path());
    config.database.backend = Backend::Sqlite;
    config.database.database = dir.path().join("covid.db").display().to_string();
    config.database.table = "casos cidades; DROP".to_string();

    let err = Pipeline::run_with_config(&config).await.unwrap_err();

    assert!(matches!(err, PipelineError::SourceNotFound { .. }));
    assert!(!dir.path().join("covid.db").exists());

    // with the source present, the bad table name is what stops the run
    write_dataset(&dir.path().join("caso_full.csv"))?;
    let err = Pipeline::run_with_config(&config).await.unwrap_err();
    assert!(!matches!(err, PipelineError::SourceNotFound { .. }));
    assert!(err.to_string().contains("casos cidades"));
    Ok(())
}

#[tokio::test]
async fn sqlite_backend_persists_the_cleaned_table() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(&dir.path().join("caso_full.csv"))?;
    let mut config = config_for(dir.path());
    config.database.backend = Backend::Sqlite;
    config.database.database = dir.path().join("covid.db").display().to_string();

    let store = open_store(&config.database)?;
    let result = Pipeline::run(&config, store.as_ref()).await?;
    assert_eq!(result.rows_written, 3);

    let conn = rusqlite::Connection::open(dir.path().join("covid.db"))?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM casos_cidades", [], |r| r.get(0))?;
    let deaths: i64 = conn.query_row(
        "SELECT deaths FROM casos_cidades WHERE city = 'CityC'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(count, 3);
    assert_eq!(deaths, 75);
    Ok(())
}

#[test]
fn config_file_drives_the_run_settings() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("covid.toml");
    fs::write(
        &path,
        r#"
        [source]
        path = "data/caso_full.csv"

        [database]
        backend = "memory"
        table = "city_cases"

        [report]
        top_n = 10

        [charts]
        enabled = false
        "#,
    )?;

    let config = Config::load(Some(path.as_path()))?;

    assert_eq!(config.source.path, Path::new("data/caso_full.csv"));
    assert_eq!(config.database.backend, Backend::Memory);
    assert_eq!(config.database.table, "city_cases");
    assert_eq!(config.report.top_n, 10);
    assert!(!config.charts.enabled);
    Ok(())
}
