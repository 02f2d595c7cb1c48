mod api;
mod app_state;
mod config;
mod core;
mod domain;
mod errors;
mod logging;
mod routes;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app_state::build_app_state;
use crate::config::Options;
use crate::core::client::cluster_client_manager::{ClusterClientManager, KubeClientFactory};
use crate::core::client::prometheus_client::{HttpPromClient, DEFAULT_QUERY_TIMEOUT};
use crate::core::util::namespace::current_namespace_or_default;
use crate::domain::context::{ServiceContext, ServiceSettings};
use crate::domain::monitoring::metrics::MetricsQuerier;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let opts = Options::parse();
    opts.validate()?;
    let _log_guard = logging::init(opts.debug, opts.log_dir.as_deref());

    info!("Starting kantaloupe-apiserver {}", env!("CARGO_PKG_VERSION"));
    if opts.insecure_port == 0 {
        bail!("serving on secure-port {} is not supported, set an insecure-port", opts.secure_port);
    }
    if opts.secure_port != 0 {
        warn!(secure_port = opts.secure_port, "TLS serving is not supported, secure-port is ignored");
    }

    let clients = Arc::new(ClusterClientManager::new(
        KubeClientFactory::new(opts.kubeconfig.clone()),
        opts.client_ttl(),
    ));
    let prom = HttpPromClient::new(&opts.prometheus_addr, DEFAULT_QUERY_TIMEOUT)?;
    let settings = ServiceSettings {
        fanout_limit: opts.fanout_concurrency,
        skip_check_kube_system_id: opts.skip_check_cluster_kubesystem_id,
        namespace: current_namespace_or_default(),
        libcuda_log_level: opts.libcuda_log_level.clone(),
    };
    info!(
        namespace = %settings.namespace,
        prometheus = %opts.prometheus_addr,
        fanout = settings.fanout_limit,
        "Service context ready"
    );

    let ctx = Arc::new(ServiceContext::new(clients, MetricsQuerier::new(Arc::new(prom)), settings));
    let app = routes::app_router().with_state(build_app_state(ctx));

    let address = opts.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
