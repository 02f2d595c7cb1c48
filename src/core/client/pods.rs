use anyhow::Result;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::debug;

use crate::core::client::kube_resources::Pod;

/// Fetch pods filtered by label selector (e.g. "app=myservice"), optionally within a namespace
pub async fn fetch_pods_by_label(
    client: &Client,
    namespace: Option<&str>,
    label_selector: &str,
) -> Result<Vec<Pod>> {
    let pods: Api<Pod> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let lp = ListParams::default().labels(label_selector);
    let pod_list = pods.list(&lp).await?;

    debug!("Found {} pod(s) with label '{}'", pod_list.items.len(), label_selector);
    Ok(pod_list.items)
}
