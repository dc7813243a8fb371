use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use heisenberg::config::Settings;
use heisenberg::db;
use heisenberg::directory::PgDirectory;
use heisenberg::feed_publisher::{FeedPublisher, NatsFeedSink};
use heisenberg::stream_consumer::{ConsumeError, StreamConsumer};
use heisenberg::stream_source::JetStreamSource;
use heisenberg::telemetry_processor::TelemetryProcessor;
use heisenberg::telemetry_repo::TelemetryRepository;
use heisenberg::web;

#[derive(Parser)]
#[command(name = "heisenberg")]
#[command(about = "Telemetry processing worker for the aircraft tracking pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry worker
    Run {
        /// Deployment environment whose config file is loaded (defaults to
        /// SERVER_ENV, then "prod")
        #[arg(long)]
        environment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { environment } => {
            let environment = environment
                .or_else(|| std::env::var("SERVER_ENV").ok())
                .unwrap_or_else(|| "prod".to_string());

            let settings =
                Settings::load(&environment).context("Failed to load configuration")?;

            init_tracing(&settings.log_level);
            handle_run(settings).await
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect_nats(settings: &Settings) -> Result<async_nats::Client> {
    let mut options = async_nats::ConnectOptions::new().name(&settings.app_name);
    if let Some(token) = &settings.nats_token {
        options = options.token(token.clone());
    }

    let client = options
        .connect(settings.nats_url.as_str())
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", settings.nats_url))?;

    info!("NATS connection established ({})", settings.nats_url);
    Ok(client)
}

async fn handle_run(settings: Settings) -> Result<()> {
    info!(
        "Starting telemetry worker (environment: {})",
        settings.environment
    );

    // Broker: fatal when unreachable at startup
    let nats_client = connect_nats(&settings).await?;
    let jetstream = async_nats::jetstream::new(nats_client.clone());

    // Database: fatal when unreachable or when migrations fail
    let pool = db::build_pool(&settings.database_url).context("Failed to connect to PostgreSQL")?;
    if settings.auto_migrate {
        db::run_migrations(&pool).context("Failed to run migrations")?;
    }

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let telemetry_repo = TelemetryRepository::new(pool);
    let feeds = FeedPublisher::new(
        NatsFeedSink::new(nats_client),
        settings.global_feed_subject.clone(),
        settings.alert_feed_subject.clone(),
    );
    let processor = Arc::new(TelemetryProcessor::new(directory, telemetry_repo, feeds));

    let source = JetStreamSource::new(
        jetstream,
        settings.stream_name.clone(),
        settings.consumer_group.clone(),
        settings.consumer_name(),
    );
    let consumer = Arc::new(StreamConsumer::new(source));

    // Health surface
    let health_port = settings.port;
    tokio::spawn(async move {
        if let Err(e) = web::serve_health(health_port).await {
            error!("Health check server failed: {}", e);
        }
    });

    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    let worker_consumer = Arc::clone(&consumer);
    let worker_processor = Arc::clone(&processor);
    let mut worker = tokio::spawn(async move {
        worker_consumer
            .consume(worker_cancel, move |entry| {
                let processor = Arc::clone(&worker_processor);
                async move {
                    processor
                        .process_entry(entry)
                        .await
                        .map_err(anyhow::Error::from)
                }
            })
            .await
    });

    info!("Telemetry worker started");

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut worker => {
            // The consume loop only returns on its own when startup or the
            // broker went unrecoverably wrong
            match result {
                Ok(Err(e)) => return Err(anyhow::Error::from(e).context("Worker exited unexpectedly")),
                Ok(Ok(())) => anyhow::bail!("Worker exited unexpectedly without error"),
                Err(e) => return Err(anyhow::anyhow!("Worker task panicked: {e}")),
            }
        }
    }

    warn!("Shutdown signal received, draining in-flight entries...");
    cancel.cancel();

    match worker.await {
        Ok(Err(ConsumeError::Cancelled)) => info!("Worker drained and stopped"),
        Ok(Err(e)) => return Err(anyhow::Error::from(e).context("Worker failed during shutdown")),
        Ok(Ok(())) => info!("Worker stopped"),
        Err(e) => return Err(anyhow::anyhow!("Worker task panicked: {e}")),
    }

    info!("Service stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
