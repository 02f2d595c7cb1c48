use anyhow::Result;
use kube::Client;
use tracing::debug;

use crate::core::client::kube_resources::Node;
use crate::core::client::other_resources::{fetch_cluster_scoped, fetch_cluster_scoped_by_name};
use crate::errors::{is_not_found, AppError};

/// Every node of a member cluster.
pub async fn fetch_nodes(client: &Client) -> Result<Vec<Node>> {
    let nodes: Vec<Node> = fetch_cluster_scoped(client, None).await?;
    debug!("Discovered {} node(s)", nodes.len());
    Ok(nodes)
}

/// A missing node surfaces as `NotFound` naming the node.
pub async fn fetch_node_by_name(client: &Client, name: &str) -> Result<Node> {
    match fetch_cluster_scoped_by_name(client, name).await {
        Err(err) if is_not_found(&err) => Err(AppError::NotFound(format!("node {} not found", name)).into()),
        other => other,
    }
}
