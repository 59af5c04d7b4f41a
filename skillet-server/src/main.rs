use clap::Parser;
use skillet::changes::HttpChangesSource;
use skillet::content::{ContentFetcher, HttpContentFetcher, NoopContentFetcher};
use skillet::language::WhatlangIdentifier;
use skillet::{ControllerConfig, IndexController, WorkerConfig};
use skillet_http::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "skillet")]
struct Cli {
    /// Root directory of the write-side shard tree
    #[arg(long, env = "SKILLET_DATA_DIR", default_value = "./data")]
    data_dir: String,

    /// Directory of docType description files
    #[arg(long, env = "SKILLET_MAPPING_DIR", default_value = "./mappings")]
    mapping_dir: String,

    #[arg(long, env = "SKILLET_BIND_ADDR", default_value = "127.0.0.1:7900")]
    bind_addr: String,

    /// Base URL of the upstream document database (change feed)
    #[arg(long, env = "SKILLET_FEED_URL", default_value = "http://127.0.0.1:5984")]
    feed_url: String,

    /// Base URL of the read-side query service
    #[arg(long, env = "SKILLET_QUERY_URL", default_value = "http://127.0.0.1:7901")]
    query_url: String,

    /// Base URL of the file-content extractor; bodies are skipped when unset
    #[arg(long, env = "SKILLET_EXTRACTOR_URL")]
    extractor_url: Option<String>,

    /// Root of the read-side store tree served by the receiver endpoints
    #[arg(long, env = "SKILLET_QUERY_DATA_DIR", default_value = "./query-data")]
    query_data_dir: String,

    /// Instances to initialize at startup, besides those found on disk
    #[arg(long, env = "SKILLET_INSTANCES", value_delimiter = ',')]
    instances: Vec<String>,

    /// Seconds between full refresh ticks; 0 disables the scheduler
    #[arg(long, env = "SKILLET_UPDATE_INTERVAL", default_value = "300")]
    update_interval: u64,
}

/// Instances already on disk resume indexing without being listed.
fn discover_instances(data_dir: &str, explicit: &[String]) -> Vec<String> {
    let mut instances: Vec<String> = explicit.to_vec();
    if let Ok(entries) = std::fs::read_dir(data_dir) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                if !instances.contains(&name) {
                    instances.push(name);
                }
            }
        }
    }
    instances.sort();
    instances
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let extractor: Arc<dyn ContentFetcher> = match &cli.extractor_url {
        Some(url) => {
            tracing::info!("content extraction enabled via {}", url);
            Arc::new(HttpContentFetcher::new(url.clone()))
        }
        None => {
            tracing::warn!("no extractor configured, file bodies will not be indexed");
            Arc::new(NoopContentFetcher)
        }
    };

    let mut config = ControllerConfig::new(&cli.data_dir, &cli.mapping_dir, &cli.query_url);
    config.worker = WorkerConfig::default();

    let controller = IndexController::new(
        config,
        Arc::new(HttpChangesSource::new(cli.feed_url.clone())),
        extractor,
        Arc::new(WhatlangIdentifier::new()),
    );

    let instances = discover_instances(&cli.data_dir, &cli.instances);
    tracing::info!("initializing {} instance(s)", instances.len());
    controller.init(&instances).await?;
    controller.update_all_indexes()?;

    if cli.update_interval > 0 {
        let scheduler = Arc::clone(&controller);
        let interval = Duration::from_secs(cli.update_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the startup refresh already ran
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.update_all_indexes() {
                    tracing::warn!("scheduled refresh failed: {}", e);
                }
            }
        });
    }

    let state = Arc::new(AppState {
        controller,
        query_root: cli.query_data_dir.into(),
    });
    skillet_http::serve(state, &cli.bind_addr).await
}
