//! Plain kubernetes objects of a member cluster: configmaps, secrets, volumes,
//! storage classes, namespaces and events.

use std::collections::HashMap;

use anyhow::Result;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::client::kube_resources::{
    ConfigMap, Event, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota, Secret, StorageClass,
};
use crate::core::client::namespaces::fetch_namespaces;
use crate::core::client::other_resources::{
    create_namespaced, delete_cluster_scoped, delete_namespaced, fetch_cluster_scoped, fetch_cluster_scoped_by_name,
    fetch_deployment_events, fetch_events_for, fetch_namespaced, fetch_namespaced_by_name, replace_namespaced,
};
use crate::core::util::constants::MANAGED_BY_LABEL_KEY;
use crate::core::util::filter::{filter_by_fuzzy_name, HasName};
use crate::core::util::sort::snake_to_camel;
use crate::core::util::validation::{require_dns1035, require_object_name};
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::resource::dto::resource_request::{EventFilter, EventKind, NameFilter, NamespaceFilter, SecretRequest};
use crate::domain::resource::dto::resource_view::{ConfigMapView, EventView, NamespaceView, SecretView};
use crate::domain::resource::dto::volume_view::{PersistentVolumeClaimView, PersistentVolumeView, StorageClassView};
use crate::errors::invalid_argument;

/// Convert, fuzzy filter on name, sort then page.
fn list_views<K, V>(objects: &[K], keyword: &str, opts: &ListOptions) -> Result<ListResponse<V>>
where
    V: for<'a> From<&'a K> + HasName + Serialize,
{
    let views: Vec<V> = objects.iter().map(V::from).collect();
    let filtered = filter_by_fuzzy_name(views, keyword);
    Ok(opts.apply(filtered, &snake_to_camel)?)
}

/// The object named in a write body must be the one addressed by the URL.
pub fn ensure_consistent(field: &str, in_body: &str, in_url: &str) -> Result<()> {
    if in_body == in_url {
        Ok(())
    } else {
        Err(invalid_argument(format!(
            "The {}({}) in the request body is inconsistent with that in the URL.",
            field, in_body
        )))
    }
}

fn require_namespaced(cluster: &str, namespace: &str, kind: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    require_dns1035("namespace name", namespace)?;
    require_dns1035(&format!("{} name", kind), name)
}

// ==================== ConfigMaps ====================

pub async fn list_configmaps(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<ConfigMapView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let configmaps: Vec<ConfigMap> = fetch_namespaced(&client, namespace, None).await?;
    list_views(&configmaps, &filter.name, opts)
}

pub async fn get_configmap(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<ConfigMapView> {
    let configmap = get_configmap_json(ctx, cluster, namespace, name).await?;
    Ok(ConfigMapView::from(&configmap))
}

/// The configmap as the apiserver returns it, for the YAML editor.
pub async fn get_configmap_json(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<ConfigMap> {
    require_namespaced(cluster, namespace, "configmap", name)?;
    let client = ctx.cluster_client(cluster).await?;
    let mut configmap: ConfigMap = fetch_namespaced_by_name(&client, namespace, name).await?;
    configmap.metadata.managed_fields = None;
    Ok(configmap)
}

pub async fn create_configmap(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    mut configmap: ConfigMap,
) -> Result<ConfigMapView> {
    require_dns1035("cluster name", cluster)?;
    if let Some(ns) = configmap.metadata.namespace.as_deref() {
        ensure_consistent("namespace", ns, namespace)?;
    }
    require_object_name(&configmap.name_any(), namespace)?;
    configmap.metadata.namespace = Some(namespace.to_string());

    let client = ctx.cluster_client(cluster).await?;
    let created = create_namespaced(&client, namespace, &configmap).await?;
    info!(cluster = %cluster, "Created configmap {}/{}", namespace, created.name_any());
    Ok(ConfigMapView::from(&created))
}

/// Replace a configmap, carrying over the live resource version.
pub async fn update_configmap(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
    mut configmap: ConfigMap,
) -> Result<ConfigMap> {
    require_namespaced(cluster, namespace, "configMap", name)?;
    ensure_consistent("namespace", configmap.metadata.namespace.as_deref().unwrap_or_default(), namespace)?;
    ensure_consistent("name", configmap.metadata.name.as_deref().unwrap_or_default(), name)?;

    let client = ctx.cluster_client(cluster).await?;
    let older: ConfigMap = fetch_namespaced_by_name(&client, namespace, name).await?;
    configmap.metadata.resource_version = older.metadata.resource_version;
    let mut updated = replace_namespaced(&client, namespace, &configmap).await?;
    updated.metadata.managed_fields = None;
    Ok(updated)
}

pub async fn delete_configmap(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    require_namespaced(cluster, namespace, "configmap", name)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_namespaced::<ConfigMap>(&client, namespace, name).await
}

// ==================== Secrets ====================

pub async fn list_secrets(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<SecretView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let secrets: Vec<Secret> = fetch_namespaced(&client, namespace, None).await?;
    list_views(&secrets, &filter.name, opts)
}

pub async fn get_secret(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<SecretView> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let secret: Secret = fetch_namespaced_by_name(&client, namespace, name).await?;
    Ok(SecretView::from(&secret))
}

pub async fn create_secret(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    req: &SecretRequest,
) -> Result<SecretView> {
    require_dns1035("cluster name", cluster)?;
    require_object_name(&req.metadata.name, namespace)?;
    let secret = req.to_secret(namespace)?;

    let client = ctx.cluster_client(cluster).await?;
    let created = create_namespaced(&client, namespace, &secret).await?;
    info!(cluster = %cluster, "Created secret {}/{}", namespace, created.name_any());
    Ok(SecretView::from(&created))
}

pub async fn update_secret(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
    req: &SecretRequest,
) -> Result<SecretView> {
    require_dns1035("cluster name", cluster)?;
    ensure_consistent("name", &req.metadata.name, name)?;
    require_object_name(name, namespace)?;
    let mut secret = req.to_secret(namespace)?;

    let client = ctx.cluster_client(cluster).await?;
    let older: Secret = fetch_namespaced_by_name(&client, namespace, name).await?;
    secret.metadata.resource_version = older.metadata.resource_version;
    let updated = replace_namespaced(&client, namespace, &secret).await?;
    Ok(SecretView::from(&updated))
}

pub async fn delete_secret(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_namespaced::<Secret>(&client, namespace, name).await
}

// ==================== Volumes ====================

pub async fn list_persistent_volumes(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<PersistentVolumeView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let volumes: Vec<PersistentVolume> = fetch_cluster_scoped(&client, None).await?;
    list_views(&volumes, &filter.name, opts)
}

pub async fn get_persistent_volume(ctx: &ServiceContext, cluster: &str, name: &str) -> Result<PersistentVolumeView> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let volume: PersistentVolume = fetch_cluster_scoped_by_name(&client, name).await?;
    Ok(PersistentVolumeView::from(&volume))
}

pub async fn delete_persistent_volume(ctx: &ServiceContext, cluster: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_cluster_scoped::<PersistentVolume>(&client, name).await
}

pub async fn list_persistent_volume_claims(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<PersistentVolumeClaimView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let claims: Vec<PersistentVolumeClaim> = fetch_namespaced(&client, namespace, None).await?;
    list_views(&claims, &filter.name, opts)
}

pub async fn get_persistent_volume_claim(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
) -> Result<PersistentVolumeClaimView> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let claim: PersistentVolumeClaim = fetch_namespaced_by_name(&client, namespace, name).await?;
    Ok(PersistentVolumeClaimView::from(&claim))
}

pub async fn delete_persistent_volume_claim(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_namespaced::<PersistentVolumeClaim>(&client, namespace, name).await
}

pub async fn list_storage_classes(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &NameFilter,
    opts: &ListOptions,
) -> Result<ListResponse<StorageClassView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let classes: Vec<StorageClass> = fetch_cluster_scoped(&client, None).await?;
    list_views(&classes, &filter.name, opts)
}

pub async fn get_storage_class(ctx: &ServiceContext, cluster: &str, name: &str) -> Result<StorageClassView> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let class: StorageClass = fetch_cluster_scoped_by_name(&client, name).await?;
    Ok(StorageClassView::from(&class))
}

pub async fn delete_storage_class(ctx: &ServiceContext, cluster: &str, name: &str) -> Result<()> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_cluster_scoped::<StorageClass>(&client, name).await
}

// ==================== Namespaces ====================

/// Names of the quotas the console manages, keyed by namespace.
pub fn managed_quota_names(quotas: &[ResourceQuota]) -> HashMap<String, Vec<String>> {
    let mut by_namespace: HashMap<String, Vec<String>> = HashMap::new();
    for quota in quotas.iter().filter(|q| q.labels().contains_key(MANAGED_BY_LABEL_KEY)) {
        by_namespace
            .entry(quota.namespace().unwrap_or_default())
            .or_default()
            .push(quota.name_any());
    }
    by_namespace
}

pub async fn list_namespaces(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &NamespaceFilter,
    opts: &ListOptions,
) -> Result<ListResponse<NamespaceView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let namespaces = fetch_namespaces(&client).await?;

    let mut quotas = HashMap::new();
    if filter.resource_quota {
        let all: Vec<ResourceQuota> = fetch_namespaced(&client, "", Some(MANAGED_BY_LABEL_KEY)).await?;
        quotas = managed_quota_names(&all);
    }

    let views: Vec<NamespaceView> = namespaces
        .iter()
        .map(|ns| {
            let name = ns.name_any();
            NamespaceView {
                resource_quotas: quotas.remove(&name).unwrap_or_default(),
                name,
            }
        })
        .collect();
    let filtered = filter_by_fuzzy_name(views, &filter.name);
    Ok(opts.apply(filtered, &snake_to_camel)?)
}

// ==================== Events ====================

/// Events of one pod or deployment, or of the whole namespace when no kind is given.
pub async fn list_events(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    filter: &EventFilter,
    opts: &ListOptions,
) -> Result<ListResponse<EventView>> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;

    let events: Vec<Event> = match filter.kind() {
        Some(EventKind::Pod) => {
            let pod: Pod = fetch_namespaced_by_name(&client, namespace, &filter.kind_name).await?;
            fetch_events_for(&client, namespace, "Pod", &pod.name_any()).await?
        }
        Some(EventKind::Deployment) => fetch_deployment_events(&client, namespace, &filter.kind_name).await?,
        None => fetch_namespaced(&client, namespace, None).await?,
    };
    debug!("Listing {} event(s) in {}/{}", events.len(), cluster, namespace);

    let views: Vec<EventView> = events.iter().map(EventView::from).collect();
    Ok(opts.apply(views, &snake_to_camel)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify;
    use std::collections::BTreeMap;

    fn configmap(name: &str) -> ConfigMap {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some(name.into());
        cm.metadata.namespace = Some("team-a".into());
        cm
    }

    #[test]
    fn test_inconsistent_name_message() {
        let err = ensure_consistent("name", "other", "app-config").unwrap_err();
        let app = classify(err);
        assert_eq!(app.code(), "INVALID_ARGUMENT");
        assert_eq!(
            app.to_string(),
            "The name(other) in the request body is inconsistent with that in the URL."
        );
        assert!(ensure_consistent("namespace", "team-a", "team-a").is_ok());
    }

    #[test]
    fn test_list_views_filter_sort_page() {
        let objects = vec![configmap("web-b"), configmap("db"), configmap("web-a")];
        let opts = ListOptions {
            page: 1,
            page_size: 10,
            sort_field: "metadata.name".into(),
            sort_asc: true,
        };
        let resp: ListResponse<ConfigMapView> = list_views(&objects, "web", &opts).unwrap();
        let names: Vec<_> = resp.items.iter().map(|v| v.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["web-a", "web-b"]);
        assert_eq!(resp.pagination.total, 2);
    }

    #[test]
    fn test_managed_quota_names() {
        let quota = |ns: &str, name: &str, managed: bool| {
            let mut q = ResourceQuota::default();
            q.metadata.name = Some(name.into());
            q.metadata.namespace = Some(ns.into());
            if managed {
                q.metadata.labels = Some(BTreeMap::from([(MANAGED_BY_LABEL_KEY.to_string(), "kantaloupe".to_string())]));
            }
            q
        };
        let map = managed_quota_names(&[
            quota("team-a", "gpu-quota", true),
            quota("team-a", "pods", false),
            quota("team-b", "gpu-quota", true),
        ]);
        assert_eq!(map["team-a"], vec!["gpu-quota"]);
        assert_eq!(map.len(), 2);
    }
}
