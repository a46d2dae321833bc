use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ticket_monitor::{
    config::{Config, SourceKind},
    metrics,
    models::RawAlert,
    pipeline::{format_minutes, Classifier, DateRangePreset, FilterCriteria, Pipeline},
    scheduler::Poller,
    server::Server,
    sources::{create_source, SqliteTicketSource},
};

#[derive(Parser)]
#[command(author, version, about = "Classify, correlate and aggregate ticket alerts", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the ticket source and serve the HTTP API (default)
    Serve,
    /// Fetch once and print stats and problem groups as JSON
    Report {
        /// today, yesterday, thisWeek, lastWeek, thisMonth, lastMonth or all
        #[arg(short, long, default_value = "all")]
        range: String,
    },
    /// Load a JSON array of messages into the SQLite store
    Import {
        /// JSON file with [{id, subject, message, created_at}, ...]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ticket_monitor={},info", cli.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Report { range } => report(config, &range).await,
        Commands::Import { file } => import(config, &file).await,
    }
}

fn build_pipeline(config: &Config) -> Result<Arc<Pipeline>> {
    let table = config
        .keyword_table()
        .context("failed to load keyword table")?;
    Ok(Arc::new(Pipeline::new(Classifier::new(table))))
}

async fn serve(config: Config) -> Result<()> {
    metrics::register_metrics()?;

    let source = create_source(&config.source).await?;
    let poller = Arc::new(Poller::new(
        source,
        build_pipeline(&config)?,
        Duration::from_secs(config.poll.interval_secs),
    ));

    let server = Server::new(poller.clone());
    info!("Starting server on {}", config.server.addr);

    if !config.poll.enabled {
        warn!("Polling disabled; loading a single snapshot");
        poller.refresh().await;
        server.start(&config.server.addr).await?;
        return Ok(());
    }

    info!("Refreshing every {:?}", poller.interval());
    let poll_task = poller.clone().spawn();

    // The poll loop only ends by panicking.
    tokio::select! {
        result = server.start(&config.server.addr) => {
            result?;
        }
        joined = poll_task => {
            match joined {
                Ok(()) => error!("Poll loop exited"),
                Err(e) => error!("Poll loop failed: {}", e),
            }
            anyhow::bail!("poll loop stopped; snapshot would go stale");
        }
    }

    Ok(())
}

async fn report(config: Config, range: &str) -> Result<()> {
    let criteria = match range {
        "all" => FilterCriteria::default(),
        other => {
            let preset: DateRangePreset = other.parse()?;
            FilterCriteria::default().with_date_range(preset.resolve(&chrono::Local::now()))
        }
    };

    let source = create_source(&config.source).await?;
    let poller = Poller::new(
        source,
        build_pipeline(&config)?,
        Duration::from_secs(config.poll.interval_secs),
    );
    let info = poller.refresh().await;
    if info.degraded {
        warn!("Report built from fallback data: {:?}", info.error);
    }

    let snapshot = poller.snapshot().await;
    let output = poller
        .pipeline()
        .run(&snapshot.alerts, &criteria, chrono::Utc::now());

    let avg_resolution: BTreeMap<String, String> = output
        .stats
        .avg_resolution_minutes
        .iter()
        .map(|(sector, minutes)| (sector.to_string(), format_minutes(minutes.round() as i64)))
        .collect();

    let report = json!({
        "snapshot": info,
        "avg_resolution": avg_resolution,
        "overall_avg_resolution": format_minutes(output.stats.overall_avg_resolution_minutes.round() as i64),
        "stats": output.stats,
        "problems": output.problems,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn import(config: Config, file: &Path) -> Result<()> {
    if config.source.kind != SourceKind::Sqlite {
        warn!("TICKET_SOURCE is not sqlite; importing into {} anyway", config.source.sqlite_path.display());
    }

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let alerts: Vec<RawAlert> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of messages", file.display()))?;

    let store = SqliteTicketSource::new(&config.source.sqlite_path, config.source.limit).await?;
    store.init().await?;
    let written = store.import(&alerts).await?;

    info!("Imported {} messages from {}", written, file.display());
    Ok(())
}
