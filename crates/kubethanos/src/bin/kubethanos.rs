//! kubethanos - kills a random share of pods in the configured namespaces on every
//! interval.
//!
//! The binary wires the chaos loop to a real cluster:
//! - parses flags (and `KUBETHANOS_*` environment variables)
//! - connects to the API server using kubeconfig, `--master`, or in-cluster config
//! - serves `/healthz` for liveness probes
//! - stops after the current cycle on Ctrl+C or SIGTERM

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kubethanos::config::LogFormat;
use kubethanos::{
    Args, ChaosConfig, ChaosEngine, ControlLoop, KubeEventEmitter, KubeInstanceStore,
    SelectionEngine, TerminationExecutor,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ChaosConfig::try_from(args).context("invalid configuration")?;

    init_tracing(&config);

    info!(
        namespaces = %config.scope,
        included_pod_names = ?config.included_pod_names.as_ref().map(regex::Regex::as_str),
        excluded_pod_names = ?config.excluded_pod_names.as_ref().map(regex::Regex::as_str),
        master = ?config.master,
        kubeconfig = ?config.kubeconfig,
        interval = ?config.interval,
        kill_fraction = config.kill_fraction,
        dry_run = config.dry_run,
        debug = config.debug,
        "Starting kubethanos v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = connect(&config).await.context("failed to connect to cluster")?;

    let store = Arc::new(KubeInstanceStore::new(client.clone()));
    let events = Arc::new(KubeEventEmitter::new(
        client,
        std::env::var("POD_NAME").ok(),
    ));

    let selection = SelectionEngine::new(store.clone(), config.scope.clone(), config.kill_fraction);
    let executor = TerminationExecutor::new(store, events, config.dry_run);
    let control = ControlLoop::new(ChaosEngine::new(selection, executor));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(config.health_addr)
        .await
        .with_context(|| format!("failed to start health check endpoint on {}", config.health_addr))?;

    let health_handle = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = kubethanos::health::serve(listener, shutdown).await {
                error!(error = %e, "health check endpoint failed");
            }
        })
    };

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    control
        .run(ControlLoop::ticker(config.interval), shutdown_rx)
        .await;

    let _ = health_handle.await;
    info!("kubethanos stopped");

    Ok(())
}

fn init_tracing(config: &ChaosConfig) {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Build a client from, in order: `--kubeconfig`, `$KUBECONFIG`, `$HOME/.kube/config`,
/// in-cluster config.
async fn connect(config: &ChaosConfig) -> Result<Client> {
    // $KUBECONFIG may list several files; only the inferred config merges them
    let kubeconfig_path = match &config.kubeconfig {
        Some(path) => Some(path.clone()),
        None if std::env::var_os("KUBECONFIG").is_some() => None,
        None => home_kubeconfig(),
    };

    let mut kube_config = match &kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };

    if let Some(master) = &config.master {
        kube_config.cluster_url = master
            .parse()
            .with_context(|| format!("invalid master URL {master}"))?;
    }

    info!(
        kubeconfig = ?kubeconfig_path,
        master = %kube_config.cluster_url,
        "found config with parameters"
    );

    let client = Client::try_from(kube_config)?;
    let version = client.apiserver_version().await?;
    info!(server_version = %version.git_version, "connected to cluster");

    Ok(client)
}

fn home_kubeconfig() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let path = PathBuf::from(home).join(".kube").join("config");
    path.exists().then_some(path)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, finishing current cycle");
        },
        () = terminate => {
            info!("Received SIGTERM, finishing current cycle");
        },
    }
}
