use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trace_ingest_core::batcher::BatcherConfig;
use trace_ingest_core::lifecycle::IngestionServer;
use trace_ingest_core::metrics::Metrics;
use trace_ingest_core::otlp::{self, IngestionService};
use trace_ingest_core::project::{Project, ProjectStore, StaticProjectStore};
use trace_ingest_core::store::{BulkInserterBoxed, LoggingInserter};

/// Trace ingestion core — authenticates OTLP span batches against a project
/// directory, normalizes/classifies/fingerprints every span, and hands two
/// parallel row projections to a columnar store in bulk.
#[derive(Parser)]
#[command(name = "trace-ingest-core", about = "OTLP trace ingestion core")]
struct Args {
    /// OTLP gRPC bind address
    #[arg(long, default_value = "[::]:4317")]
    otlp_addr: String,

    /// Health / debug HTTP bind address
    #[arg(long, default_value = "0.0.0.0:8081")]
    http_addr: String,

    /// Override the derived batch size (default: clamp(2000*cores, 2000, 32000))
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override the ingress channel bound (default: same as the batch size)
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// Batcher flush interval, in seconds
    #[arg(long, default_value_t = 1)]
    flush_interval_secs: u64,

    /// `id:token:name` triples seeding the in-memory project directory. The
    /// real project directory lookup lives outside the core (spec §1); this
    /// flag exists so the binary is runnable standalone.
    #[arg(long = "project", value_name = "ID:TOKEN:NAME")]
    projects: Vec<String>,
}

fn parse_projects(raw: &[String]) -> anyhow::Result<Vec<Project>> {
    raw.iter()
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let id = parts.next().ok_or_else(|| anyhow::anyhow!("missing project id in {entry:?}"))?;
            let token = parts.next().ok_or_else(|| anyhow::anyhow!("missing project token in {entry:?}"))?;
            let name = parts.next().unwrap_or("").to_string();
            Ok(Project { id: id.parse()?, token: token.to_string(), name })
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trace_ingest_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let projects = parse_projects(&args.projects)?;
    let project_store: Arc<dyn ProjectStore> = Arc::new(StaticProjectStore::new(projects));

    let cores = num_cpus::get();
    let mut batcher_config = BatcherConfig::from_cores(cores);
    if let Some(batch_size) = args.batch_size {
        batcher_config.batch_size = batch_size;
        batcher_config.channel_capacity = batch_size;
    }
    if let Some(channel_capacity) = args.channel_capacity {
        batcher_config.channel_capacity = channel_capacity;
    }
    batcher_config.flush_interval = Duration::from_secs(args.flush_interval_secs);

    let metrics = Arc::new(Metrics::new());
    let store: Arc<dyn BulkInserterBoxed> = Arc::new(LoggingInserter);

    let server = IngestionServer::start(batcher_config, store, metrics.clone());
    let ingestion_service = IngestionService::new(project_store, server.sender.clone());

    let otlp_addr = args.otlp_addr.clone();
    let otlp_task = tokio::spawn(async move {
        if let Err(e) = otlp::run_otlp_server(ingestion_service, &otlp_addr).await {
            tracing::error!("OTLP server error: {e}");
        }
    });

    let http_addr = args.http_addr.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = trace_ingest_core::http::run_http_server(metrics, &http_addr).await {
            tracing::error!("HTTP server error: {e}");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining in-flight flushes");
    otlp_task.abort();
    http_task.abort();
    server.shutdown().await?;

    Ok(())
}
