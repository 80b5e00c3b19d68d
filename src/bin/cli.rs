//! catalog-import CLI
//!
//! Local execution entry point. For AWS Lambda, use the
//! `import-file-parser`, `catalog-batch-process` and `import-products-file`
//! binaries.

use std::path::PathBuf;
use std::sync::Arc;

use catalog_import::{
    error::{AppError, Result},
    models::{Config, ObjectLocation, PriceClass},
    pipeline,
    services::RowReader,
    storage::{CatalogStore, LocalObjectStore, MemoryCatalog, ObjectStore},
};
use clap::{Parser, Subcommand};
use serde_json::json;

/// catalog-import - CSV product import pipeline
#[derive(Parser, Debug)]
#[command(
    name = "catalog-import",
    version,
    about = "Import product CSV files into the catalog"
)]
struct Cli {
    /// Local object storage root; objects live at {storage_dir}/{bucket}/{key}
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a CSV file and print the row messages it would produce
    Parse {
        /// Path to the CSV file
        file: PathBuf,
    },

    /// Run uploaded files through extraction and catalog writes locally
    Import {
        /// Object keys under the uploaded prefix, e.g. `uploaded/products.csv`
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print event source settings and subscription filter policies
    Settings,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the config file, then environment overrides. Logging starts here,
/// at the configured level, before any load failure is reported.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let (mut config, load_error) = Config::load_or_default(&path);
    config.apply_env(|name| std::env::var(name).ok())?;
    init_logging(cli.verbose, &config.logging.level);

    if let Some(e) = load_error {
        log::warn!("Config load failed from {:?}: {}. Using defaults.", path, e);
    }
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Parse { file } => {
            let reader = tokio::fs::File::open(file).await?;
            let mut rows = RowReader::new(reader).await?;
            log::info!(
                "Columns: {}",
                rows.columns().collect::<Vec<_>>().join(", ")
            );

            let mut count = 0;
            while let Some(row) = rows.next_row().await? {
                println!("{}", serde_json::to_string(&row)?);
                count += 1;
            }
            log::info!("{} row message(s) from {}", count, file.display());
        }

        Command::Import { keys } => {
            let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&cli.storage_dir));
            let catalog: Arc<dyn CatalogStore> = Arc::new(MemoryCatalog::new());
            let locations: Vec<ObjectLocation> = keys
                .iter()
                .map(|key| ObjectLocation::new(&config.import.bucket, key))
                .collect();

            let summary = pipeline::run_import(&config, objects, catalog, &locations).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if !summary.is_clean() {
                return Err(AppError::Import {
                    failed: summary.failures.len() + summary.dead_letters.len(),
                    total: summary.files.len() + summary.failures.len() + summary.rows_queued,
                    first_error: summary
                        .failures
                        .first()
                        .map(|f| format!("{}: {}", f.location, f.error))
                        .or_else(|| {
                            summary
                                .dead_letters
                                .first()
                                .map(|body| format!("dead-lettered {body}"))
                        })
                        .unwrap_or_default(),
                });
            }
        }

        Command::Settings => {
            let threshold = config.notifications.price_threshold;
            let subscriptions: Vec<_> = PriceClass::ALL_CLASSES
                .iter()
                .map(|class| {
                    json!({
                        "class": class,
                        "filterPolicy": class.filter_policy(threshold),
                    })
                })
                .collect();
            let settings = json!({
                "parser": {
                    "bucket": config.import.bucket,
                    "trigger": { "event": "s3:ObjectCreated:*", "prefix": config.import.uploaded_prefix },
                    "parsedPrefix": config.import.parsed_prefix,
                },
                "queue": {
                    "visibilityTimeoutSecs": config.queue.visibility_timeout_secs,
                    "maxReceiveCount": config.queue.max_receive_count,
                },
                "consumer": {
                    "batchSize": config.catalog.batch_size,
                    "maximumBatchingWindowSecs": config.catalog.max_batching_window_secs,
                    "maximumConcurrency": config.catalog.max_concurrency,
                },
                "notifications": {
                    "subject": config.notifications.subject,
                    "subscriptions": subscriptions,
                },
            });
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
