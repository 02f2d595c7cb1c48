use std::fmt::Debug;

use anyhow::Result;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::core::client::kube_resources::{Deployment, Event};
use crate::core::util::constants::{KIND_DEPLOYMENT, SELECT_ALL};

/// Bounds shared by every typed resource handled here.
pub trait KubeObject:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
}

impl<K> KubeObject for K where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
}

fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector.filter(|s| !s.is_empty()) {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

/// Api over one namespace, or all of them for an empty namespace or `__ALL__`.
fn namespaced_api<K>(client: &Client, namespace: &str) -> Api<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    if namespace.is_empty() || namespace == SELECT_ALL {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), namespace)
    }
}

// ==================== Namespaced resources ====================

/// Fetch namespaced objects (ConfigMaps, Secrets, PVCs, quotas...)
pub async fn fetch_namespaced<K>(
    client: &Client,
    namespace: &str,
    label_selector: Option<&str>,
) -> Result<Vec<K>>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = namespaced_api(client, namespace);
    let list = api.list(&list_params(label_selector)).await?;

    debug!("Discovered {} {}(s) in '{}'", list.items.len(), K::kind(&()), namespace);
    Ok(list.items)
}

/// Fetch a single namespaced object by name
pub async fn fetch_namespaced_by_name<K>(client: &Client, namespace: &str, name: &str) -> Result<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let object = api.get(name).await?;

    debug!("Fetched {}: {}/{}", K::kind(&()), namespace, name);
    Ok(object)
}

pub async fn create_namespaced<K>(client: &Client, namespace: &str, object: &K) -> Result<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let created = api.create(&PostParams::default(), object).await?;

    debug!("Created {}: {}/{}", K::kind(&()), namespace, created.name_any());
    Ok(created)
}

pub async fn replace_namespaced<K>(client: &Client, namespace: &str, object: &K) -> Result<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let updated = api
        .replace(&object.name_any(), &PostParams::default(), object)
        .await?;

    debug!("Updated {}: {}/{}", K::kind(&()), namespace, updated.name_any());
    Ok(updated)
}

pub async fn delete_namespaced<K>(client: &Client, namespace: &str, name: &str) -> Result<()>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.delete(name, &DeleteParams::default()).await?;

    debug!("Deleted {}: {}/{}", K::kind(&()), namespace, name);
    Ok(())
}

// ==================== Cluster-scoped resources ====================

/// Fetch cluster-scoped objects (PersistentVolumes, StorageClasses...)
pub async fn fetch_cluster_scoped<K>(client: &Client, label_selector: Option<&str>) -> Result<Vec<K>>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    let api: Api<K> = Api::all(client.clone());
    let list = api.list(&list_params(label_selector)).await?;

    debug!("Discovered {} {}(s)", list.items.len(), K::kind(&()));
    Ok(list.items)
}

pub async fn fetch_cluster_scoped_by_name<K>(client: &Client, name: &str) -> Result<K>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    let api: Api<K> = Api::all(client.clone());
    let object = api.get(name).await?;

    debug!("Fetched {}: {}", K::kind(&()), name);
    Ok(object)
}

pub async fn create_cluster_scoped<K>(client: &Client, object: &K) -> Result<K>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    let api: Api<K> = Api::all(client.clone());
    let created = api.create(&PostParams::default(), object).await?;

    debug!("Created {}: {}", K::kind(&()), created.name_any());
    Ok(created)
}

pub async fn delete_cluster_scoped<K>(client: &Client, name: &str) -> Result<()>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    let api: Api<K> = Api::all(client.clone());
    api.delete(name, &DeleteParams::default()).await?;

    debug!("Deleted {}: {}", K::kind(&()), name);
    Ok(())
}

// ==================== Events ====================

/// Fetch the events whose involved object is `kind/name` in `namespace`
pub async fn fetch_events_for(
    client: &Client,
    namespace: &str,
    kind: &str,
    name: &str,
) -> Result<Vec<Event>> {
    let events: Api<Event> = namespaced_api(client, namespace);
    let field_selector = format!("involvedObject.kind={},involvedObject.name={}", kind, name);
    let lp = ListParams::default().fields(&field_selector);
    let event_list = events.list(&lp).await?;

    debug!("Found {} event(s) for {} {}/{}", event_list.items.len(), kind, namespace, name);
    Ok(event_list.items)
}

/// Events of a deployment; the deployment must exist
pub async fn fetch_deployment_events(client: &Client, namespace: &str, name: &str) -> Result<Vec<Event>> {
    let deployment: Deployment = fetch_namespaced_by_name(client, namespace, name).await?;
    fetch_events_for(client, namespace, KIND_DEPLOYMENT, &deployment.name_any()).await
}
