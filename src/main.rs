use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use k8s_openapi::api::core::v1::Pod;
use pod_reconciler::file_io::open_file_for_append;
use pod_reconciler::ControllerConfig;
use pod_reconciler::Error;
use pod_reconciler::PipelineBuilder;
use pod_reconciler::PodLoggingHandler;
use pod_reconciler::Result;
use pod_reconciler::SystemError;
use pod_reconciler::LOG_FILE_NAME;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Mirrors the Pods of one namespace and reconciles every change.
#[derive(Debug, Parser)]
#[command(name = "pod-reconciler", version, about)]
struct Args {
    /// API server endpoint, e.g. https://10.0.0.1:6443
    #[arg(long = "apiserver-url")]
    apiserver_url: Option<String>,

    /// Path to the kubeconfig holding the credentials
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Namespace to watch
    #[arg(long)]
    namespace: Option<String>,

    /// Number of reconcile workers
    #[arg(long)]
    workers: Option<usize>,

    /// Extra configuration file merged over `CONFIG_PATH` and defaults
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args)?;

    // Initializing Logs
    let _guard = init_observability(config.monitoring.log_dir())?;
    info!(?config, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let pipeline = match PipelineBuilder::<Pod, PodLoggingHandler>::new(config, graceful_rx)
        .connect()
        .await
        .and_then(|builder| builder.build())
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("failed to start: {}", e);
            return Err(e);
        }
    };

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = pipeline.run().await {
        error!("pipeline stops: {}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

/// defaults -> `CONFIG_PATH` -> `CONTROLLER__*` env -> `--config` -> flags
fn load_config(args: Args) -> Result<ControllerConfig> {
    let mut config = ControllerConfig::new()?;
    if let Some(path) = &args.config {
        config = config.with_override_config(path)?;
    }

    if let Some(url) = args.apiserver_url {
        config.source.api_server_url = url;
    }
    if let Some(kubeconfig) = args.kubeconfig {
        config.source.kubeconfig = kubeconfig;
    }
    if let Some(namespace) = args.namespace {
        config.source.namespace = namespace;
    }
    if let Some(workers) = args.workers {
        config.queue.workers = workers;
    }

    config.validate()
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::from(SystemError::SignalSenderClosed(format!(
            "Failed to send shutdown signal: {}",
            e
        )))
    })?;

    Ok(())
}

/// Logs to `log_dir/controller.log` when a directory is configured, stdout otherwise.
fn init_observability(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let (non_blocking, guard) = match log_dir {
        Some(dir) => tracing_appender::non_blocking(open_file_for_append(&dir.join(LOG_FILE_NAME))?),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
