use anyhow::{anyhow, Result};
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::debug;

use crate::core::client::kube_resources::Namespace;

const KUBE_SYSTEM: &str = "kube-system";

/// Fetch all namespaces in the cluster
pub async fn fetch_namespaces(client: &Client) -> Result<Vec<Namespace>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let namespace_list = namespaces.list(&ListParams::default()).await?;

    debug!("Discovered {} namespace(s)", namespace_list.items.len());
    Ok(namespace_list.items)
}

/// UID of `kube-system`, which identifies a cluster across kubeconfigs
pub async fn fetch_kube_system_uid(client: &Client) -> Result<String> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = namespaces.get(KUBE_SYSTEM).await?;

    ns.metadata
        .uid
        .ok_or_else(|| anyhow!("namespace {} has no uid", KUBE_SYSTEM))
}
