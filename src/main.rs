use clap::Parser;
use covid_city_report::config::{Backend, Config};
use covid_city_report::error::Result;
use covid_city_report::logging;
use covid_city_report::pipeline::{Pipeline, PipelineResult};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "covid_city_report")]
#[command(about = "Clean per-city COVID-19 counts, store them and report on deaths, population and cases")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input CSV file, overriding source.path
    #[arg(long)]
    input: Option<PathBuf>,

    /// Database backend: mysql, sqlite or memory
    #[arg(long)]
    backend: Option<String>,

    /// Number of cities in each ranking
    #[arg(long)]
    top: Option<usize>,

    /// Directory for the chart images
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,
}

fn build_config(cli: Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(input) = cli.input {
        config.source.path = input;
    }
    if let Some(backend) = cli.backend {
        config.database.backend = backend.parse::<Backend>()?;
    }
    if let Some(top) = cli.top {
        config.report.top_n = top;
    }
    if let Some(dir) = cli.output_dir {
        config.charts.output_dir = dir;
    }
    if cli.no_charts {
        config.charts.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<PipelineResult> {
    let config = build_config(cli)?;
    info!(database = ?config.database, "Configuration ready");

    Pipeline::run_with_config(&config).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Credentials may come from a local .env file
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(result) => {
            info!(
                "Run complete: {} raw rows, {} cities written, {} charts",
                result.clean.raw_rows,
                result.rows_written,
                result.charts.len()
            );
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(e.exit_code());
        }
    }
}
