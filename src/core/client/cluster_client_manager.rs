//! Per-cluster Kubernetes clients, built from kubeconfig secrets and cached with a TTL.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tokio::sync::{OnceCell, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::client::kube_client::{build_local_client, client_from_kubeconfig};
use crate::core::crd::cluster::Cluster;
use crate::core::util::constants::LOCAL_CLUSTER;

pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(60);
pub const KUBECONFIG_SECRET_KEY: &str = "config";

/// Builds the clients the manager caches.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: Clone + Send + Sync + 'static;

    async fn local(&self) -> Result<Self::Client>;

    async fn member(&self, local: &Self::Client, cluster: &str) -> Result<Self::Client>;
}

struct Entry<C> {
    client: C,
    expires_at: Instant,
}

pub struct ClusterClientManager<F: ClientFactory> {
    factory: F,
    ttl: Duration,
    local: OnceCell<F::Client>,
    cache: RwLock<HashMap<String, Entry<F::Client>>>,
}

pub type KubeClientManager = ClusterClientManager<KubeClientFactory>;

impl<F: ClientFactory> ClusterClientManager<F> {
    pub fn new(factory: F, ttl: Duration) -> Self {
        Self {
            factory,
            ttl,
            local: OnceCell::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The local-cluster client, built on first use and kept for the process lifetime.
    pub async fn local_client(&self) -> Result<F::Client> {
        let client = self
            .local
            .get_or_try_init(|| async {
                info!("Initializing local cluster client");
                self.factory.local().await
            })
            .await?;
        Ok(client.clone())
    }

    /// Client for `cluster`. Cached entries are reused until their TTL runs out.
    pub async fn get_client(&self, cluster: &str) -> Result<F::Client> {
        if cluster == LOCAL_CLUSTER {
            return self.local_client().await;
        }

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(cluster) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.client.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        let now = Instant::now();
        if let Some(entry) = cache.get(cluster) {
            if entry.expires_at > now {
                return Ok(entry.client.clone());
            }
        }
        cache.retain(|_, e| e.expires_at > now);

        let local = self.local_client().await?;
        debug!(cluster = %cluster, "Building member cluster client");
        let client = self
            .factory
            .member(&local, cluster)
            .await
            .with_context(|| format!("failed to build client for cluster {}", cluster))?;
        cache.insert(
            cluster.to_string(),
            Entry {
                client: client.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(client)
    }

    /// Drop a cached entry so the next call rebuilds it.
    pub async fn invalidate(&self, cluster: &str) {
        self.cache.write().await.remove(cluster);
    }
}

// ==================== kube-rs factory ====================

/// Reads the `Cluster` object and its kubeconfig secret from the local cluster.
pub struct KubeClientFactory {
    kubeconfig_path: Option<String>,
}

impl KubeClientFactory {
    pub fn new(kubeconfig_path: Option<String>) -> Self {
        Self { kubeconfig_path }
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    type Client = Client;

    async fn local(&self) -> Result<Client> {
        build_local_client(self.kubeconfig_path.as_deref()).await
    }

    async fn member(&self, local: &Client, cluster: &str) -> Result<Client> {
        let clusters: Api<Cluster> = Api::all(local.clone());
        let object = clusters.get(cluster).await?;
        let secret_ref = object
            .spec
            .secret_ref
            .ok_or_else(|| anyhow!("cluster {} does not have a secret", cluster))?;

        let secrets: Api<Secret> = Api::namespaced(local.clone(), &secret_ref.namespace);
        let secret = secrets.get(&secret_ref.name).await?;
        let raw = secret
            .data
            .as_ref()
            .and_then(|d| d.get(KUBECONFIG_SECRET_KEY))
            .ok_or_else(|| anyhow!("the secret data is empty"))?;
        let yaml = String::from_utf8(raw.0.clone())
            .map_err(|e| anyhow!("kubeconfig is not valid utf-8: {}", e))?;

        client_from_kubeconfig(&yaml).await
    }
}
