use std::sync::Arc;

use anyhow::Result;
use kube::Client;

use crate::core::client::cluster_client_manager::KubeClientManager;
use crate::core::util::constants::DEFAULT_LIBCUDA_LOG_LEVEL;
use crate::core::util::fanout::DEFAULT_FANOUT_LIMIT;
use crate::domain::monitoring::metrics::MetricsQuerier;

/// Knobs the view assemblers read at request time.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub fanout_limit: usize,
    /// Allow two clusters to share a `kube-system` UID.
    pub skip_check_kube_system_id: bool,
    /// Namespace holding kubeconfig secrets and credentials.
    pub namespace: String,
    /// `LIBCUDA_LOG_LEVEL` injected into flow containers.
    pub libcuda_log_level: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            fanout_limit: DEFAULT_FANOUT_LIMIT,
            skip_check_kube_system_id: false,
            namespace: crate::core::util::namespace::current_namespace_or_default(),
            libcuda_log_level: DEFAULT_LIBCUDA_LOG_LEVEL.to_string(),
        }
    }
}

/// Shared handles every domain service works against.
pub struct ServiceContext {
    pub clients: Arc<KubeClientManager>,
    pub metrics: MetricsQuerier,
    pub settings: ServiceSettings,
}

impl ServiceContext {
    pub fn new(clients: Arc<KubeClientManager>, metrics: MetricsQuerier, settings: ServiceSettings) -> Self {
        Self {
            clients,
            metrics,
            settings,
        }
    }

    /// Client of the cluster hosting the `Cluster` registry.
    pub async fn local_client(&self) -> Result<Client> {
        self.clients.local_client().await
    }

    /// Client of a member cluster; `local-cluster` resolves to the local client.
    pub async fn cluster_client(&self, cluster: &str) -> Result<Client> {
        self.clients.get_client(cluster).await
    }
}
