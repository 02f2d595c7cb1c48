use anyhow::Result;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

use crate::core::crd::cluster::Cluster;

/// Fetch all registered clusters from the local cluster
pub async fn fetch_clusters(client: &Client) -> Result<Vec<Cluster>> {
    let clusters: Api<Cluster> = Api::all(client.clone());
    let cluster_list = clusters.list(&ListParams::default()).await?;

    debug!("Discovered {} cluster(s)", cluster_list.items.len());
    Ok(cluster_list.items)
}

/// Fetch a single cluster by name
pub async fn fetch_cluster_by_name(client: &Client, name: &str) -> Result<Cluster> {
    let clusters: Api<Cluster> = Api::all(client.clone());
    let cluster = clusters.get(name).await?;

    debug!("Fetched cluster: {}", name);
    Ok(cluster)
}

pub async fn create_cluster(client: &Client, cluster: &Cluster) -> Result<Cluster> {
    let clusters: Api<Cluster> = Api::all(client.clone());
    Ok(clusters.create(&PostParams::default(), cluster).await?)
}

pub async fn replace_cluster(client: &Client, name: &str, cluster: &Cluster) -> Result<Cluster> {
    let clusters: Api<Cluster> = Api::all(client.clone());
    Ok(clusters.replace(name, &PostParams::default(), cluster).await?)
}

pub async fn delete_cluster(client: &Client, name: &str) -> Result<()> {
    let clusters: Api<Cluster> = Api::all(client.clone());
    clusters.delete(name, &DeleteParams::default()).await?;

    debug!("Deleted cluster: {}", name);
    Ok(())
}
