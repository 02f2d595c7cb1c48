//! Member cluster registry: CRUD on `Cluster` objects in the local cluster plus the
//! list view enriched with live metrics.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{anyhow, Result};
use k8s_openapi::ByteString;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info};

use crate::core::client::cluster_client_manager::KUBECONFIG_SECRET_KEY;
use crate::core::client::prometheus_client::MetricsError;
use crate::core::client::clusters::{
    create_cluster, delete_cluster as delete_cluster_object, fetch_cluster_by_name, fetch_clusters,
    replace_cluster,
};
use crate::core::client::kube_client::{client_from_kubeconfig, server_version};
use crate::core::client::kube_resources::{Node, ObjectMeta, Secret};
use crate::core::client::namespaces::fetch_kube_system_uid;
use crate::core::client::nodes::fetch_nodes;
use crate::core::client::other_resources::{create_namespaced, fetch_namespaced_by_name, replace_namespaced};
use crate::core::client::pods::fetch_pods_by_label;
use crate::core::crd::cluster::{Cluster, ClusterSpec, LocalSecretReference};
use crate::core::util::annotations::NODE_REGISTER_PREFIX;
use crate::core::util::constants::{
    AWS_NEURON, AWS_NEURON_CORE, CLUSTER_ALIAS_ANNOTATION_KEY, CLUSTER_DESCRIPTION_ANNOTATION_KEY,
    CLUSTER_NAME_LABEL_KEY, DEFAULT_PROVIDER, HAMI_SCHEDULER_COMPONENT_LABEL, LOCAL_CLUSTER, METAX_GPU, METAX_VCORE, METAX_VMEMORY,
    NVIDIA_GPU, NVIDIA_GPU_CORES, NVIDIA_GPU_MEMORY,
};
use crate::core::util::fanout::try_fan_out;
use crate::core::util::filter::matches_fuzzy;
use crate::core::util::sort::{snake_to_camel, SortValue, LOWEST_NAME};
use crate::core::util::validation::{require_annotations, require_dns1035, require_labels};
use crate::domain::cluster::dto::cluster_request::{
    specified, ClusterFilter, ClusterType, IntegrateClusterRequest, UpdateClusterRequest,
};
use crate::domain::cluster::dto::cluster_view::{
    cluster_state, CardRequestType, CardRequestTypes, ClusterMetrics, ClusterPlugin, ClusterPlugins,
    ClusterVersions, ClusterView, PluginName, ResourceName, Validation,
};
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::{ServiceContext, ServiceSettings};
use crate::domain::monitoring::metrics::{best_effort, MetricsQuerier};
use crate::domain::monitoring::query::{GpuQueryType, MetricQuery, QueryType, ResourceType};
use crate::errors::{invalid_argument, is_not_found, AppError};

pub const PROMETHEUS_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const METAX_GPU_DEVICE: &str = "metax-tech.com/gpu";

// ==================== List ====================

pub async fn list_clusters(
    ctx: &ServiceContext,
    filter: &ClusterFilter,
    opts: &ListOptions,
) -> Result<ListResponse<ClusterView>> {
    let local = ctx.local_client().await?;
    let clusters = fetch_clusters(&local).await?;
    cluster_list_view(&ctx.metrics, ctx.settings.fanout_limit, clusters, filter, opts).await
}

/// Filter, sort, page, then attach metrics to the clusters on the page. Clusters that are
/// not ready carry no metrics block.
pub async fn cluster_list_view(
    metrics: &MetricsQuerier,
    fanout_limit: usize,
    clusters: Vec<Cluster>,
    filter: &ClusterFilter,
    opts: &ListOptions,
) -> Result<ListResponse<ClusterView>> {
    let filtered = filter_clusters(clusters, filter);
    let page = opts.apply_keyed(filtered, &snake_to_camel, local_cluster_key)?;

    let views = try_fan_out(
        fanout_limit,
        page.items.iter().map(|cluster| async move {
            if !cluster.is_ready() {
                return Ok(ClusterView::new(cluster, None));
            }
            let name = cluster.name_any();
            let (enriched, gpu_total) = tokio::try_join!(cluster_metrics(metrics, &name), gpu_count(metrics, &name))?;
            let mut view = ClusterView::new(cluster, Some(enriched));
            view.status.gpu_total = gpu_total;
            Ok::<_, MetricsError>(view)
        }),
    )
    .await?;

    Ok(ListResponse {
        items: views,
        pagination: page.pagination,
    })
}

/// On the name path `local-cluster` sorts as `"!"`, below every DNS label.
fn local_cluster_key(cluster: &Cluster, path: &[String], value: SortValue) -> SortValue {
    if path == ["metadata", "name"] && cluster.name_any() == LOCAL_CLUSTER {
        SortValue::Str(LOWEST_NAME.to_string())
    } else {
        value
    }
}

pub fn filter_clusters(clusters: Vec<Cluster>, filter: &ClusterFilter) -> Vec<Cluster> {
    clusters
        .into_iter()
        .filter(|c| matches_fuzzy(&c.name_any(), &filter.name))
        .filter(|c| specified(&filter.state).map_or(true, |s| s == cluster_state(c).as_str()))
        .filter(|c| specified(&filter.cluster_type).map_or(true, |t| t == c.spec.type_))
        .filter(|c| specified(&filter.provider).map_or(true, |p| p == c.spec.provider))
        .collect()
}

/// Usage/allocation ratios for cpu, memory, gpu core and gpu memory. A family whose
/// total is zero reads as 0.
pub async fn cluster_metrics(metrics: &MetricsQuerier, cluster: &str) -> Result<ClusterMetrics, MetricsError> {
    let (cpu, memory, core, gpu_memory) = tokio::try_join!(
        resource_ratios(metrics, cluster, ResourceType::Cpu),
        resource_ratios(metrics, cluster, ResourceType::Memory),
        resource_ratios(metrics, cluster, ResourceType::GpuCore),
        resource_ratios(metrics, cluster, ResourceType::GpuMemory),
    )?;
    Ok(ClusterMetrics {
        cpu_usage: cpu.0,
        memory_usage: memory.0,
        gpu_core_usage: core.0,
        gpu_memory_usage: gpu_memory.0,
        gpu_core_allocated: core.1,
        gpu_memory_allocated: gpu_memory.1,
    })
}

async fn resource_ratios(
    metrics: &MetricsQuerier,
    cluster: &str,
    resource: ResourceType,
) -> Result<(f64, f64), MetricsError> {
    let Some(families) = resource.query_types() else {
        return Ok((0.0, 0.0));
    };
    let Some(total_type) = families.total else {
        return Ok((0.0, 0.0));
    };
    let total = best_effort(
        "cluster total",
        metrics.one(&MetricQuery::cluster(cluster, total_type)).await.map(|s| s.value),
    )?;
    if total == 0.0 {
        return Ok((0.0, 0.0));
    }

    let used = async {
        best_effort(
            "cluster used",
            metrics.one(&MetricQuery::cluster(cluster, families.used)).await.map(|s| s.value),
        )
    };
    // cpu and memory have no allocation ratio on the list
    let allocated = async {
        match (resource, families.allocated) {
            (ResourceType::GpuCore | ResourceType::GpuMemory, Some(q)) => best_effort(
                "cluster allocated",
                metrics.one(&MetricQuery::cluster(cluster, q)).await.map(|s| s.value),
            ),
            _ => Ok(0.0),
        }
    };
    let (used, allocated) = tokio::try_join!(used, allocated)?;
    Ok((used / total * 100.0, allocated / total * 100.0))
}

async fn gpu_count(metrics: &MetricsQuerier, cluster: &str) -> Result<i32, MetricsError> {
    let query = MetricQuery::gpu_filtered(cluster, "", "", "", "", GpuQueryType::Count);
    let vector = best_effort("gpu count", metrics.vector(&query).await)?;
    Ok(vector.first().map(|s| s.value as i32).unwrap_or(0))
}

// ==================== CRUD ====================

pub async fn get_cluster(ctx: &ServiceContext, name: &str) -> Result<ClusterView> {
    require_dns1035("cluster name", name)?;
    let local = ctx.local_client().await?;
    let cluster = fetch_cluster_by_name(&local, name).await?;

    let count_query = MetricQuery::gpu_filtered(name, "", "", "", "", GpuQueryType::Count);
    let memory_query = MetricQuery::cluster(name, QueryType::GpuMemTotal);
    let (count, memory) = tokio::join!(ctx.metrics.vector(&count_query), ctx.metrics.vector(&memory_query));

    let mut view = ClusterView::new(&cluster, None);
    if let Some(s) = best_effort("gpu count", count)?.first() {
        view.status.gpu_total = s.value as i32;
    }
    if let Some(s) = best_effort("gpu memory total", memory)?.first() {
        view.status.gpu_memory_total = s.value as i64;
    }
    Ok(view)
}

/// Validate, register the kubeconfig secret and create the `Cluster`.
pub async fn integrate_cluster(ctx: &ServiceContext, req: IntegrateClusterRequest) -> Result<ClusterView> {
    if req.kube_config.is_empty() {
        return Err(invalid_argument("the kubeconfig can not be empty"));
    }
    require_dns1035("cluster name", &req.name)?;
    require_labels("cluster", &req.labels)?;
    require_annotations("cluster", &req.annotations)?;
    let cluster_type = req
        .cluster_type
        .ok_or_else(|| invalid_argument("cluster type must be specified"))?;

    let member = reachable_client(&req.kube_config)
        .await
        .map_err(|e| invalid_argument(format!("the kubeconfig is invalid, err: {:#}", e)))?;
    if !req.prometheus_address.is_empty() {
        check_prometheus_health(&req.prometheus_address)
            .await
            .map_err(|e| invalid_argument(format!("the prometheus address is invalid, err: {:#}", e)))?;
    }
    if !req.gateway_address.is_empty() {
        reqwest::Url::parse(&req.gateway_address)
            .map_err(|e| invalid_argument(format!("the gateway address is invalid, err: {}", e)))?;
    }

    let cluster = cluster_from_request(&req, cluster_type);
    let local = ctx.local_client().await?;
    let created = create_cluster_with_secret(&local, &ctx.settings, cluster, &member, &req.kube_config).await?;
    info!(cluster = %req.name, "Integrated cluster");
    Ok(ClusterView::new(&created, None))
}

pub fn cluster_from_request(req: &IntegrateClusterRequest, cluster_type: ClusterType) -> Cluster {
    let mut cluster = Cluster::new(
        &req.name,
        ClusterSpec {
            provider: if req.provider.is_empty() {
                DEFAULT_PROVIDER.to_string()
            } else {
                req.provider.clone()
            },
            type_: cluster_type.as_str().to_string(),
            secret_ref: Some(LocalSecretReference::default()),
            prometheus_address: req.prometheus_address.clone(),
            gateway_address: req.gateway_address.clone(),
            ..Default::default()
        },
    );
    let mut annotations = req.annotations.clone();
    annotations.insert(CLUSTER_ALIAS_ANNOTATION_KEY.to_string(), req.alias_name.clone());
    annotations.insert(CLUSTER_DESCRIPTION_ANNOTATION_KEY.to_string(), req.description.clone());
    cluster.metadata.labels = Some(req.labels.clone());
    cluster.metadata.annotations = Some(annotations);
    cluster
}

/// Reject a duplicate `kube-system` UID before anything is written, then store the
/// kubeconfig secret, create the cluster and make the cluster own the secret.
async fn create_cluster_with_secret(
    local: &Client,
    settings: &ServiceSettings,
    mut cluster: Cluster,
    member: &Client,
    kubeconfig: &str,
) -> Result<Cluster> {
    let name = cluster.name_any();

    cluster.spec.cluster_id = fetch_kube_system_uid(member).await?;
    if !settings.skip_check_kube_system_id {
        let existing = fetch_clusters(local).await?;
        if existing.iter().any(|c| c.spec.cluster_id == cluster.spec.cluster_id) {
            return Err(AppError::Conflict(format!("cluster {} already exists", name)).into());
        }
    }

    let mut secret = kubeconfig_secret(&name, &settings.namespace, kubeconfig);
    let stored = upsert_secret(local, &secret).await.map_err(|e| {
        error!(cluster = %name, "failed to create kubeconfig for cluster: {:#}", e);
        e
    })?;
    cluster.spec.secret_ref = Some(LocalSecretReference {
        name: stored.name_any(),
        namespace: stored.namespace().unwrap_or_default(),
    });

    let created = create_cluster(local, &cluster).await?;

    let owner = created
        .owner_ref(&())
        .ok_or_else(|| anyhow!("created cluster {} has no uid", name))?;
    secret.metadata.owner_references = Some(vec![owner]);
    if let Err(e) = upsert_secret(local, &secret).await {
        error!(cluster = %name, "failed to set owner reference for cluster secret: {:#}", e);
        if let Err(cleanup) = delete_cluster_object(local, &name).await {
            error!(cluster = %name, "failed to clear failed create cluster: {:#}", cleanup);
        }
        return Err(e);
    }
    Ok(created)
}

pub fn kubeconfig_secret(cluster: &str, namespace: &str, kubeconfig: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(format!("{}-secret", cluster)),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(CLUSTER_NAME_LABEL_KEY.to_string(), cluster.to_string())])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            KUBECONFIG_SECRET_KEY.to_string(),
            ByteString(kubeconfig.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// Create `secret`, or overwrite its labels, data and owners when it already exists.
async fn upsert_secret(client: &Client, secret: &Secret) -> Result<Secret> {
    let namespace = secret.namespace().unwrap_or_default();
    let name = secret.name_any();
    match fetch_namespaced_by_name::<Secret>(client, &namespace, &name).await {
        Ok(mut current) => {
            let owners = secret
                .metadata
                .owner_references
                .clone()
                .or_else(|| current.metadata.owner_references.clone());
            if current.data == secret.data
                && current.metadata.labels == secret.metadata.labels
                && current.metadata.owner_references == owners
            {
                return Ok(current);
            }
            current.data = secret.data.clone();
            current.metadata.labels = secret.metadata.labels.clone();
            current.metadata.owner_references = owners;
            replace_namespaced(client, &namespace, &current).await
        }
        Err(e) if is_not_found(&e) => create_namespaced(client, &namespace, secret).await,
        Err(e) => Err(e),
    }
}

/// Merge the non-empty request fields into the stored cluster.
pub async fn update_cluster(ctx: &ServiceContext, name: &str, req: UpdateClusterRequest) -> Result<()> {
    require_dns1035("cluster name", name)?;
    if let Some(labels) = &req.labels {
        require_labels("cluster", labels)?;
    }
    if let Some(annotations) = &req.annotations {
        require_annotations("cluster", annotations)?;
    }

    let local = ctx.local_client().await?;
    let mut cluster = fetch_cluster_by_name(&local, name).await?;
    merge_update(&mut cluster, &req);

    if !req.kube_config.is_empty() {
        let secret = kubeconfig_secret(name, &ctx.settings.namespace, &req.kube_config);
        upsert_secret(&local, &secret).await.map_err(|e| {
            error!(cluster = %name, "failed to update kubeconfig for cluster: {:#}", e);
            e
        })?;
        ctx.clients.invalidate(name).await;
    }

    replace_cluster(&local, name, &cluster).await?;
    Ok(())
}

pub fn merge_update(cluster: &mut Cluster, req: &UpdateClusterRequest) {
    let annotations = cluster.metadata.annotations.get_or_insert_with(BTreeMap::new);
    if !req.alias_name.is_empty() {
        annotations.insert(CLUSTER_ALIAS_ANNOTATION_KEY.to_string(), req.alias_name.clone());
    }
    if let Some(extra) = &req.annotations {
        annotations.extend(extra.clone());
    }
    if !req.description.is_empty() {
        annotations.insert(CLUSTER_DESCRIPTION_ANNOTATION_KEY.to_string(), req.description.clone());
    }
    if let Some(labels) = &req.labels {
        cluster
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.clone());
    }
    if !req.prometheus_address.is_empty() {
        cluster.spec.prometheus_address = req.prometheus_address.clone();
    }
    if !req.gateway_address.is_empty() {
        cluster.spec.gateway_address = req.gateway_address.clone();
    }
}

pub async fn delete_cluster(ctx: &ServiceContext, name: &str) -> Result<()> {
    require_dns1035("cluster name", name)?;
    let local = ctx.local_client().await?;
    delete_cluster_object(&local, name).await?;
    ctx.clients.invalidate(name).await;
    Ok(())
}

// ==================== Validation ====================

async fn reachable_client(kubeconfig: &str) -> Result<Client> {
    let client = client_from_kubeconfig(kubeconfig).await?;
    let version = server_version(&client).await?;
    debug!("cluster version {}", version.git_version);
    Ok(client)
}

pub async fn validate_kubeconfig(kubeconfig: &str) -> Result<Validation> {
    if kubeconfig.is_empty() {
        return Err(invalid_argument("the kubeconfig can not be empty"));
    }
    reachable_client(kubeconfig)
        .await
        .map_err(|e| invalid_argument(format!("the kubeconfig is invalid, err: {:#}", e)))?;
    Ok(Validation { validate: true })
}

pub async fn validate_prometheus_address(address: &str) -> Result<Validation> {
    check_prometheus_health(address)
        .await
        .map_err(|e| invalid_argument(format!("the prometheus address is invalid, err: {:#}", e)))?;
    Ok(Validation { validate: true })
}

/// `GET {address}/-/healthy` must answer 2xx within ten seconds.
pub async fn check_prometheus_health(address: &str) -> Result<()> {
    let client = reqwest::Client::builder().timeout(PROMETHEUS_HEALTH_TIMEOUT).build()?;
    let url = format!("{}/-/healthy", address.trim_end_matches('/'));
    let resp = client.get(&url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!(
            "prometheus health check failed with status code: {}",
            status.as_u16()
        ));
    }
    Ok(())
}

// ==================== Cluster facts ====================

pub async fn list_cluster_versions(ctx: &ServiceContext) -> Result<ClusterVersions> {
    let local = ctx.local_client().await?;
    let clusters = fetch_clusters(&local).await?;
    Ok(ClusterVersions {
        versions: distinct_versions(&clusters),
    })
}

pub fn distinct_versions(clusters: &[Cluster]) -> Vec<String> {
    clusters
        .iter()
        .map(|c| c.status.as_ref().map(|s| s.kubernetes_version.clone()).unwrap_or_default())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// HAMi counts as installed when its scheduler pod runs in the member cluster.
pub async fn get_cluster_plugins(ctx: &ServiceContext, name: &str) -> Result<ClusterPlugins> {
    require_dns1035("cluster name", name)?;
    let client = ctx.cluster_client(name).await?;
    let pods = fetch_pods_by_label(&client, None, HAMI_SCHEDULER_COMPONENT_LABEL).await?;

    let plugins = pods
        .first()
        .map(|pod| ClusterPlugin {
            name: PluginName::Hami,
            namespace: pod.namespace().unwrap_or_default(),
        })
        .into_iter()
        .collect();
    Ok(ClusterPlugins { plugins })
}

/// Resource names a workload may request on this cluster, per card request type.
pub async fn get_cluster_card_request_types(ctx: &ServiceContext, name: &str) -> Result<CardRequestTypes> {
    require_dns1035("cluster name", name)?;
    let local = ctx.local_client().await?;
    let cluster = fetch_cluster_by_name(&local, name).await?;

    let Some(cluster_type) = ClusterType::parse(&cluster.spec.type_) else {
        return Ok(CardRequestTypes::default());
    };
    let models = if cluster_type == ClusterType::Ascend {
        let client = ctx.cluster_client(name).await?;
        ascend_card_models(&fetch_nodes(&client).await?)
    } else {
        Vec::new()
    };
    Ok(CardRequestTypes {
        request_types: card_request_types(cluster_type, &models),
    })
}

/// Sorted, de-duplicated models from `hami.io/node-register-<model>` node annotations.
pub fn ascend_card_models(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .flat_map(|n| n.annotations().keys())
        .filter_map(|key| key.strip_prefix(NODE_REGISTER_PREFIX))
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn card_request_types(cluster_type: ClusterType, ascend_models: &[String]) -> Vec<CardRequestType> {
    let single = |request_type: &str, keys: &[&str]| CardRequestType {
        request_type: request_type.to_string(),
        resource_names: vec![ResourceName {
            card_model: String::new(),
            resource_keys: keys.iter().map(|k| k.to_string()).collect(),
        }],
    };

    match cluster_type {
        ClusterType::Nvidia => vec![
            single("NVIDIA GPU", &[NVIDIA_GPU]),
            single("NVIDIA vGPU", &[NVIDIA_GPU, NVIDIA_GPU_MEMORY, NVIDIA_GPU_CORES]),
        ],
        ClusterType::Metax => vec![
            single("MetaX GPU", &[METAX_GPU_DEVICE]),
            single("MetaX sGPU", &[METAX_GPU, METAX_VMEMORY, METAX_VCORE]),
        ],
        ClusterType::Neuron => vec![
            single("Neuron GPU", &[AWS_NEURON]),
            single("Neuron Core", &[AWS_NEURON_CORE]),
        ],
        ClusterType::Ascend => {
            let per_model = |with_memory: bool| {
                ascend_models
                    .iter()
                    .map(|model| {
                        let mut keys = vec![format!("huawei.com/{}", model)];
                        if with_memory {
                            keys.push(format!("huawei.com/{}-memory", model));
                        }
                        ResourceName {
                            card_model: model.clone(),
                            resource_keys: keys,
                        }
                    })
                    .collect()
            };
            vec![
                CardRequestType {
                    request_type: "ASCEND NPU".into(),
                    resource_names: per_model(false),
                },
                CardRequestType {
                    request_type: "ASCEND vNPU".into(),
                    resource_names: per_model(true),
                },
            ]
        }
    }
}
