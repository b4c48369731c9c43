use crate::charts;
use crate::cleaner::clean_records;
use crate::config::{ChartsConfig, Config, DatabaseConfig, SourceConfig};
use crate::db::open_store;
use crate::error::Result;
use crate::loader::load_records;
use crate::report::Report;
use crate::storage::CityTableStore;
use crate::types::{CityRecord, CleanReport};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument};

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub clean: CleanReport,
    pub rows_written: usize,
    pub report: Report,
    pub charts: Vec<PathBuf>,
}

pub struct Pipeline;

impl Pipeline {
    /// Step 1+2: read the source file and reduce it to one row per city.
    #[instrument(skip_all, fields(path = %source.path.display()))]
    pub fn load_and_clean(source: &SourceConfig) -> Result<(Vec<CityRecord>, CleanReport)> {
        info!("📥 Loading {}", source.path.display());
        let raw = load_records(&source.path, source.delimiter)?;
        Ok(clean_records(raw))
    }

    /// Step 3: replace the target table with the cleaned rows.
    #[instrument(skip_all, fields(table = %database.table, target = %store.describe()))]
    pub async fn persist(
        store: &dyn CityTableStore,
        database: &DatabaseConfig,
        records: &[CityRecord],
    ) -> Result<usize> {
        info!("💾 Writing {} rows", records.len());
        let written = store.replace_table(&database.table, records).await?;
        println!(
            "Data inserted into table '{}' of database '{}'.",
            database.table, database.database
        );
        Ok(written)
    }

    /// Step 4: compute the aggregates and print the report.
    pub fn report(records: &[CityRecord], top_n: usize) -> Report {
        let report = Report::build(records, top_n);
        print!("{}", report.render());
        report
    }

    /// Step 5: render both charts unless disabled.
    pub fn visualize(report: &Report, config: &ChartsConfig) -> Result<Vec<PathBuf>> {
        if !config.enabled {
            info!("Charts disabled; skipping");
            return Ok(Vec::new());
        }
        println!();
        charts::render_report_charts(report, config)
    }

    /// Run every stage in order against `store`, stopping at the first error.
    /// The store is not touched unless loading and cleaning succeeded.
    #[instrument(skip_all)]
    pub async fn run(config: &Config, store: &dyn CityTableStore) -> Result<PipelineResult> {
        info!("🚀 Starting pipeline");
        let t_pipeline = Instant::now();

        let (records, clean) = Self::load_and_clean(&config.source)?;
        Self::finish(config, store, records, clean, t_pipeline).await
    }

    /// Like [`Pipeline::run`], but builds the store from `config.database` once the
    /// source has been loaded and cleaned. A missing source is reported as such even
    /// when the database settings are unusable.
    #[instrument(skip_all)]
    pub async fn run_with_config(config: &Config) -> Result<PipelineResult> {
        info!("🚀 Starting pipeline");
        let t_pipeline = Instant::now();

        let (records, clean) = Self::load_and_clean(&config.source)?;
        let store = open_store(&config.database)?;
        Self::finish(config, store.as_ref(), records, clean, t_pipeline).await
    }

    async fn finish(
        config: &Config,
        store: &dyn CityTableStore,
        records: Vec<CityRecord>,
        clean: CleanReport,
        t_pipeline: Instant,
    ) -> Result<PipelineResult> {
        let rows_written = Self::persist(store, &config.database, &records).await?;
        let report = Self::report(&records, config.report.top_n);
        let charts = Self::visualize(&report, &config.charts)?;

        info!(
            "✅ Pipeline finished in {:.2}s ({} cities, {} charts)",
            t_pipeline.elapsed().as_secs_f64(),
            clean.cleaned_rows,
            charts.len()
        );

        Ok(PipelineResult {
            clean,
            rows_written,
            report,
            charts,
        })
    }
}
