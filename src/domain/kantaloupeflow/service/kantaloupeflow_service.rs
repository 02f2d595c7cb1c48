//! Kantaloupeflow CRUD plus the views that join a flow with its pod's devices.

use std::collections::BTreeMap;
use std::future::Future;

use anyhow::Result;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, Toleration};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::core::client::clusters::{fetch_cluster_by_name, fetch_clusters};
use crate::core::client::kantaloupeflows::{
    create_kantaloupeflow as create_flow_object, delete_kantaloupeflow as delete_flow_object, fetch_kantaloupeflow,
    fetch_kantaloupeflows, replace_kantaloupeflow,
};
use crate::core::client::kube_resources::ResourceQuota;
use crate::core::client::other_resources::fetch_deployment_events;
use crate::core::client::pods::fetch_pods_by_label;
use crate::core::crd::kantaloupeflow::{KantaloupeFlow, Networking, PluginType};
use crate::core::util::annotations::{
    parse_gpu_allocations, DEVICES_ALLOCATED_SUFFIX, POD_GPU_MEMORY_ANNOTATION, POD_NEURONS_ANNOTATION,
};
use crate::core::util::constants::{
    AWS_NEURON, AWS_NEURON_CORE, DEFAULT_PORT_JUPYTER, DEFAULT_PORT_SSH, DEFAULT_PORT_VSCODE, ENV_ENABLE_JUPYTER,
    ENV_ENABLE_VSCODE, ENV_GPU_CORE_UTILIZATION_POLICY, ENV_JUPYTER_TOKEN, ENV_LIBCUDA_LOG_LEVEL,
    ENV_NEURON_PROCESS_TAG, ENV_SSH_ROOT_PASSWORD, HAMI_SCHEDULER_NAME, HTTP_PROTOCOL, JUPYTER_SERVICE_NAME,
    KANTALOUPEFLOW_APP_LABEL_KEY, METAX_VCORE, METAX_VMEMORY, NETWORK_HTTP_ROUTE, NETWORK_TCP_ROUTE, NVIDIA_GPU,
    NVIDIA_GPU_CORES, NVIDIA_GPU_MEMORY, NVIDIA_QUOTA_GPU_MEMORY, POD_ALLOCATION_MEET_ANNOTATION, SORT_BY_DESC, SSH_SERVICE_NAME,
    TCP_PROTOCOL, VSCODE_SERVICE_NAME,
};
use crate::core::util::fanout::try_fan_out;
use crate::core::util::filter::matches_fuzzy;
use crate::core::util::quantity::parse_quantity;
use crate::core::util::random::random_string;
use crate::core::util::sort::snake_to_camel;
use crate::core::util::validation::{require_annotations, require_dns1035, require_labels};
use crate::domain::cluster::dto::cluster_request::{specified, ClusterState, ClusterType};
use crate::domain::cluster::dto::cluster_view::cluster_state;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::kantaloupeflow::dto::kantaloupeflow_request::{KantaloupeflowFilter, UpdateGpuMemoryRequest};
use crate::domain::kantaloupeflow::dto::kantaloupeflow_view::{
    ConditionStrings, GpuView, KantaloupeTree, KantaloupeTreeNode, KantaloupeflowConditions, KantaloupeflowDetail,
    KantaloupeflowState, KantaloupeflowView,
};
use crate::domain::monitoring::metrics::MetricsQuerier;
use crate::domain::monitoring::query::{GpuQueryType, MetricQuery, QueryType};
use crate::domain::quota::service::quota_service::fetch_quotas;
use crate::errors::{invalid_argument, AppError};

const PASSWORD_LENGTH: usize = 15;
const JUPYTER_TOKEN_LENGTH: usize = 64;
const WORKLOAD_DEPLOYMENT: &str = "deployment";
const PROVIDER_AWS_EKS: &str = "AWS_EKS";
const PROVIDER_GCP_GKE: &str = "GCP_GKE";

// ==================== Create ====================

fn push_env(container: &mut Container, name: &str, value: impl Into<String>) {
    container.env.get_or_insert_with(Vec::new).push(EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    });
}

fn limits_any(container: &Container, names: &[&str]) -> bool {
    container
        .resources
        .as_ref()
        .and_then(|r| r.limits.as_ref())
        .is_some_and(|limits| names.iter().any(|n| limits.contains_key(*n)))
}

pub fn requests_nvidia(container: &Container) -> bool {
    limits_any(container, &[NVIDIA_GPU, NVIDIA_GPU_CORES, NVIDIA_GPU_MEMORY])
}

pub fn requests_neuron(container: &Container) -> bool {
    limits_any(container, &[AWS_NEURON, AWS_NEURON_CORE])
}

/// Networking and env of the enabled plugins, plus the driver knobs, on the first container.
pub fn apply_plugins(flow: &mut KantaloupeFlow, libcuda_log_level: &str) -> Result<()> {
    let plugins = flow.spec.plugins.clone();
    let container = flow
        .spec
        .template
        .spec
        .as_mut()
        .and_then(|s| s.containers.first_mut())
        .ok_or_else(|| invalid_argument("podTemplate can not be empty"))?;

    push_env(container, ENV_LIBCUDA_LOG_LEVEL, libcuda_log_level);
    push_env(container, ENV_GPU_CORE_UTILIZATION_POLICY, "force");

    let mut networking = Vec::new();
    let network = |name: &str, type_: &str, protocol: &str, port: i32| Networking {
        name: name.to_string(),
        type_: type_.to_string(),
        protocol: protocol.to_string(),
        port,
        url: String::new(),
    };
    if plugins.contains(&PluginType::Ssh) {
        networking.push(network(SSH_SERVICE_NAME, NETWORK_TCP_ROUTE, TCP_PROTOCOL, DEFAULT_PORT_SSH));
        push_env(container, ENV_SSH_ROOT_PASSWORD, random_string(PASSWORD_LENGTH));
    }
    if plugins.contains(&PluginType::Vscode) {
        networking.push(network(VSCODE_SERVICE_NAME, NETWORK_HTTP_ROUTE, TCP_PROTOCOL, DEFAULT_PORT_VSCODE));
        push_env(container, ENV_ENABLE_VSCODE, "true");
    }
    if plugins.contains(&PluginType::Jupyter) {
        networking.push(network(JUPYTER_SERVICE_NAME, NETWORK_HTTP_ROUTE, HTTP_PROTOCOL, DEFAULT_PORT_JUPYTER));
        push_env(container, ENV_ENABLE_JUPYTER, "true");
        push_env(container, ENV_JUPYTER_TOKEN, random_string(JUPYTER_TOKEN_LENGTH));
    }
    flow.spec.networking = networking;
    Ok(())
}

/// Provider specific scheduling tweaks.
pub fn patch_by_provider(flow: &mut KantaloupeFlow, provider: &str) {
    let tag = format!("{}/{}", flow.namespace().unwrap_or_default(), flow.name_any());
    let Some(pod) = flow.spec.template.spec.as_mut() else {
        return;
    };
    match provider {
        PROVIDER_AWS_EKS => {
            pod.scheduler_name = Some(HAMI_SCHEDULER_NAME.to_string());
            for container in pod.containers.iter_mut().filter(|c| requests_neuron(c)) {
                push_env(container, ENV_NEURON_PROCESS_TAG, tag.clone());
            }
        }
        PROVIDER_GCP_GKE => {
            if pod.containers.iter().any(requests_nvidia) {
                pod.tolerations.get_or_insert_with(Vec::new).push(Toleration {
                    key: Some(NVIDIA_GPU.to_string()),
                    operator: Some("Equal".to_string()),
                    value: Some("present".to_string()),
                    effect: Some("NoSchedule".to_string()),
                    ..Default::default()
                });
            }
        }
        _ => {}
    }
}

fn validate_create(view: &KantaloupeflowView) -> Result<()> {
    require_dns1035("kantaloupeflow name", &view.metadata.name)?;
    require_labels("kantaloupeflow", &view.metadata.labels)?;
    require_annotations("kantaloupeflow", &view.metadata.annotations)?;
    if view.spec.template.spec.containers.is_empty() {
        return Err(invalid_argument("podTemplate can not be empty"));
    }
    Ok(())
}

/// Build the flow object the way it is submitted: deployment workload, plugin bundle,
/// pod label, then the provider patch.
pub fn prepare_flow(view: &KantaloupeflowView, provider: &str, libcuda_log_level: &str) -> Result<KantaloupeFlow> {
    validate_create(view)?;
    let mut flow = view.to_flow()?;
    flow.spec.workload = WORKLOAD_DEPLOYMENT.to_string();
    apply_plugins(&mut flow, libcuda_log_level)?;

    let name = flow.name_any();
    flow.spec
        .template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(KANTALOUPEFLOW_APP_LABEL_KEY.to_string(), name);

    patch_by_provider(&mut flow, provider);
    Ok(flow)
}

pub async fn create_kantaloupeflow(ctx: &ServiceContext, cluster: &str, view: &KantaloupeflowView) -> Result<KantaloupeflowView> {
    validate_create(view)?;
    let local = ctx.local_client().await?;
    let registered = fetch_cluster_by_name(&local, cluster).await?;
    let flow = prepare_flow(view, &registered.spec.provider, &ctx.settings.libcuda_log_level)?;

    let client = ctx.cluster_client(cluster).await?;
    let created = create_flow_object(&client, &flow).await?;
    info!("Created kantaloupeflow {}/{} in {}", created.namespace().unwrap_or_default(), created.name_any(), cluster);
    Ok(KantaloupeflowView::from(&created))
}

// ==================== Devices ====================

fn first_container(pod: &Pod) -> Option<&Container> {
    pod.spec.as_ref().and_then(|s| s.containers.first())
}

fn node_of(pod: &Pod) -> String {
    pod.spec.as_ref().and_then(|s| s.node_name.clone()).unwrap_or_default()
}

fn limit_value(container: &Container, name: &str) -> Option<f64> {
    container
        .resources
        .as_ref()
        .and_then(|r| r.limits.as_ref())
        .and_then(|l| l.get(name))
        .and_then(|q| parse_quantity(&q.0).ok())
}

/// METAX: one slice sized by the container limits, identified by the workload's memory series.
async fn metax_gpus(metrics: &MetricsQuerier, cluster: &str, pod: &Pod, namespace: &str, name: &str) -> Result<Vec<GpuView>> {
    let container = first_container(pod);
    let memory = container.and_then(|c| limit_value(c, METAX_VMEMORY)).unwrap_or(0.0) as i64;
    let core = container.and_then(|c| limit_value(c, METAX_VCORE)).unwrap_or(0.0) as f32;

    let query = MetricQuery::workload(cluster, "", namespace, name, QueryType::GpuMemUsed);
    let vector = metrics.vector(&query).await?;
    Ok(vector
        .first()
        .map(|s| GpuView {
            uuid: s.label("UUID").to_string(),
            model: s.label("modelName").to_string(),
            memory,
            core,
        })
        .into_iter()
        .collect())
}

/// NVIDIA: slices from the HAMi allocation annotation; the model comes from each card's series.
async fn nvidia_gpus(metrics: &MetricsQuerier, cluster: &str, pod: &Pod) -> Result<Vec<GpuView>> {
    let Some(raw) = pod.annotations().get(POD_GPU_MEMORY_ANNOTATION) else {
        return Ok(Vec::new());
    };
    let mut gpus = Vec::new();
    for allocation in parse_gpu_allocations(raw)? {
        let query = MetricQuery::gpu(cluster, &allocation.uuid, GpuQueryType::MemUsed);
        let vector = metrics.vector(&query).await?;
        gpus.push(GpuView {
            model: vector.first().map(|s| s.label("modelName").to_string()).unwrap_or_default(),
            uuid: allocation.uuid,
            memory: allocation.memory,
            core: allocation.core as f32 / 100.0,
        });
    }
    Ok(gpus)
}

pub fn ascend_gpus(pod: &Pod) -> Result<Vec<GpuView>> {
    let mut gpus = Vec::new();
    for (key, value) in pod.annotations() {
        if !key.contains(DEVICES_ALLOCATED_SUFFIX) {
            continue;
        }
        gpus.extend(parse_gpu_allocations(value)?.into_iter().map(|a| GpuView {
            uuid: a.uuid,
            model: a.vendor,
            memory: a.memory,
            core: 0.0,
        }));
    }
    Ok(gpus)
}

pub fn neuron_gpus(pod: &Pod) -> Result<Vec<GpuView>> {
    let Some(raw) = pod.annotations().get(POD_NEURONS_ANNOTATION) else {
        return Ok(Vec::new());
    };
    Ok(parse_gpu_allocations(raw)?
        .into_iter()
        .map(|a| GpuView {
            uuid: a.uuid,
            model: a.vendor,
            memory: a.memory,
            core: a.core as f32,
        })
        .collect())
}

/// Devices of the flow's first pod and the node it runs on. A vendor lookup failure
/// leaves the device list empty.
pub async fn flow_gpus(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<(Vec<GpuView>, String)> {
    let client = ctx.cluster_client(cluster).await?;
    let selector = format!("{}={}", KANTALOUPEFLOW_APP_LABEL_KEY, name);
    let pods = fetch_pods_by_label(&client, Some(namespace), &selector).await?;
    let Some(pod) = pods.first() else {
        return Ok((Vec::new(), String::new()));
    };

    let local = ctx.local_client().await?;
    let registered = fetch_cluster_by_name(&local, cluster).await?;
    let gpus = match ClusterType::parse(&registered.spec.type_) {
        Some(ClusterType::Metax) => metax_gpus(&ctx.metrics, cluster, pod, namespace, name).await,
        Some(ClusterType::Nvidia) => nvidia_gpus(&ctx.metrics, cluster, pod).await,
        Some(ClusterType::Ascend) => ascend_gpus(pod),
        Some(ClusterType::Neuron) => neuron_gpus(pod),
        None => return Ok((Vec::new(), String::new())),
    };
    let gpus = gpus.unwrap_or_else(|e| {
        warn!(error = %e, "failed to get gpus of kantaloupeflow {}/{}", namespace, name);
        Vec::new()
    });
    Ok((gpus, node_of(pod)))
}

// ==================== Read ====================

pub async fn get_kantaloupeflow(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<KantaloupeflowDetail> {
    require_dns1035("kantaloupeflow name", name)?;
    require_dns1035("kantaloupeflow namespace", namespace)?;
    let client = ctx.cluster_client(cluster).await?;
    let flow = fetch_kantaloupeflow(&client, namespace, name).await?;

    let mut view = KantaloupeflowView::from(&flow);
    let (gpus, node) = flow_gpus(ctx, cluster, namespace, name).await?;
    view.status.gpus = gpus;
    Ok(KantaloupeflowDetail {
        kantaloupeflow: view,
        node,
    })
}

pub fn filter_flows(views: Vec<KantaloupeflowView>, filter: &KantaloupeflowFilter) -> Vec<KantaloupeflowView> {
    let state = specified(&filter.state).and_then(KantaloupeflowState::parse);
    views
        .into_iter()
        .filter(|v| matches_fuzzy(&v.metadata.name, &filter.name))
        .filter(|v| state.is_none_or(|s| v.status.state == s))
        .collect()
}

/// `field_name` sorts by name, anything else by creation time; newest first unless ascending.
/// `sortBy` picks name or creation time (`sortOption.field` as fallback); only `sortDir=desc` reverses.
pub fn flow_sort(filter: &KantaloupeflowFilter, opts: &ListOptions) -> ListOptions {
    let requested = if filter.sort_by.is_empty() { &opts.sort_field } else { &filter.sort_by };
    let field = match requested.as_str() {
        "field_name" => "metadata.name",
        _ => "metadata.creation_timestamp",
    };
    ListOptions {
        sort_field: field.to_string(),
        sort_asc: !filter.sort_dir.eq_ignore_ascii_case(SORT_BY_DESC),
        ..opts.clone()
    }
}

pub async fn list_kantaloupeflows(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &KantaloupeflowFilter,
    opts: &ListOptions,
) -> Result<ListResponse<KantaloupeflowView>> {
    if !filter.name.is_empty() {
        require_dns1035("kantaloupeflow name", &filter.name)?;
    }
    let client = ctx.cluster_client(cluster).await?;
    let flows = fetch_kantaloupeflows(&client, &filter.namespace).await?;

    let views = filter_flows(flows.iter().map(KantaloupeflowView::from).collect(), filter);
    let mut page = flow_sort(filter, opts).apply(views, &snake_to_camel)?;

    let lookups = page.items.iter().map(|item| {
        let (namespace, name) = (item.metadata.namespace.clone(), item.metadata.name.clone());
        async move { flow_gpus(ctx, cluster, &namespace, &name).await }
    });
    let gpus = try_fan_out(ctx.settings.fanout_limit, lookups).await?;
    for (item, (gpus, _)) in page.items.iter_mut().zip(gpus) {
        item.status.gpus = gpus;
    }
    Ok(page)
}

/// Running clusters with the number of flow pods per node.
pub async fn get_kantaloupe_tree(ctx: &ServiceContext) -> Result<KantaloupeTree> {
    let local = ctx.local_client().await?;
    let clusters = fetch_clusters(&local).await?;
    let running: Vec<String> = clusters
        .iter()
        .filter(|c| cluster_state(c) == ClusterState::Running)
        .map(|c| c.name_any())
        .collect();

    kantaloupe_tree(ctx.settings.fanout_limit, running, |name| async move {
        let client = ctx.cluster_client(&name).await?;
        fetch_pods_by_label(&client, None, KANTALOUPEFLOW_APP_LABEL_KEY).await
    })
    .await
}

/// Count workload pods for every cluster concurrently, keeping the cluster order.
pub async fn kantaloupe_tree<I, F, Fut>(limit: usize, clusters: I, pods_of: F) -> Result<KantaloupeTree>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<Pod>>>,
{
    let pods_of = &pods_of;
    let lookups = clusters.into_iter().map(|name| async move {
        let pods = pods_of(name.clone()).await?;
        Ok::<_, anyhow::Error>(tree_node(name, &pods))
    });
    let data = try_fan_out(limit, lookups).await?;
    Ok(KantaloupeTree { data })
}

pub fn tree_node(cluster: String, pods: &[Pod]) -> KantaloupeTreeNode {
    let mut per_node: BTreeMap<String, i32> = BTreeMap::new();
    for node in pods.iter().map(node_of).filter(|n| !n.is_empty()) {
        *per_node.entry(node).or_default() += 1;
    }
    KantaloupeTreeNode {
        name: cluster,
        value: pods.len() as i32,
        children: per_node
            .into_iter()
            .map(|(name, value)| KantaloupeTreeNode {
                name,
                value,
                children: Vec::new(),
            })
            .collect(),
    }
}

pub async fn get_kantaloupeflow_conditions(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
) -> Result<KantaloupeflowConditions> {
    require_dns1035("kantaloupeflow name", name)?;
    require_dns1035("kantaloupeflow namespace", namespace)?;
    let client = ctx.cluster_client(cluster).await?;
    let flow = fetch_kantaloupeflow(&client, namespace, name).await?;

    let mut conditions: Vec<ConditionStrings> = flow
        .conditions()
        .iter()
        .map(|c| ConditionStrings {
            type_: c.type_.clone(),
            status: c.status.clone(),
            message: c.message.clone(),
        })
        .collect();

    let events = fetch_deployment_events(&client, namespace, name).await?;
    if let Some(event) = events.first() {
        conditions.push(ConditionStrings {
            type_: event.type_.clone().unwrap_or_default(),
            status: event.reason.clone().unwrap_or_default(),
            message: event.message.clone().unwrap_or_default(),
        });
    }
    Ok(KantaloupeflowConditions { conditions })
}

// ==================== Write ====================

pub async fn delete_kantaloupeflow(ctx: &ServiceContext, cluster: &str, namespace: &str, name: &str) -> Result<()> {
    require_dns1035("kantaloupeflow cluster", cluster)?;
    require_dns1035("kantaloupeflow name", name)?;
    require_dns1035("kantaloupeflow namespace", namespace)?;
    let client = ctx.cluster_client(cluster).await?;
    delete_flow_object(&client, namespace, name).await?;
    info!("Deleted kantaloupeflow {}/{} in {}", namespace, name, cluster);
    Ok(())
}

/// `current,previous` from the allocation annotation.
pub fn parse_allocation_meet(annotation: Option<&String>) -> Result<(i64, String)> {
    let invalid = || invalid_argument(format!("kantaloupeflow annotation {} is invalid", POD_ALLOCATION_MEET_ANNOTATION));
    let raw = annotation.ok_or_else(invalid)?;
    let values: Vec<&str> = raw.split(',').collect();
    if values.len() != 2 {
        return Err(invalid());
    }
    let using = values[0].trim().parse::<i64>().map_err(|_| invalid())?;
    Ok((using, values[0].to_string()))
}

/// Whether moving from `using` to `requested` stays within every quota capping GPU memory.
pub fn gpu_memory_fits(quotas: &[ResourceQuota], using: i64, requested: i64) -> bool {
    quotas.iter().all(|quota| {
        let status = quota.status.as_ref();
        let Some(limit) = status
            .and_then(|s| s.hard.as_ref())
            .and_then(|h| h.get(NVIDIA_QUOTA_GPU_MEMORY))
        else {
            return true;
        };
        let limit = parse_quantity(&limit.0).unwrap_or(0.0);
        let used = status
            .and_then(|s| s.used.as_ref())
            .and_then(|u| u.get(NVIDIA_QUOTA_GPU_MEMORY))
            .and_then(|q| parse_quantity(&q.0).ok())
            .unwrap_or(0.0);
        used - using as f64 + requested as f64 <= limit
    })
}

/// Resize the flow's GPU memory after checking the namespace quotas; the annotation
/// keeps the new value first and the replaced one second.
pub async fn update_kantaloupeflow_gpu_memory(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
    req: &UpdateGpuMemoryRequest,
) -> Result<()> {
    require_dns1035("kantaloupeflow name", name)?;
    require_dns1035("kantaloupeflow namespace", namespace)?;
    if req.gpumemory <= 0 {
        return Err(invalid_argument(format!("kantaloupeflow memory {} is invalid", req.gpumemory)));
    }

    let client = ctx.cluster_client(cluster).await?;
    let mut flow = fetch_kantaloupeflow(&client, namespace, name).await?;
    let (using, current) = parse_allocation_meet(flow.annotations().get(POD_ALLOCATION_MEET_ANNOTATION))?;

    let quotas = fetch_quotas(ctx, cluster, namespace).await?;
    if !gpu_memory_fits(&quotas, using, req.gpumemory as i64) {
        return Err(AppError::ResourceExhausted("the quota group has no enough gpumemory resource".to_string()).into());
    }

    flow.annotations_mut().insert(
        POD_ALLOCATION_MEET_ANNOTATION.to_string(),
        format!("{},{}", req.gpumemory, current),
    );
    replace_kantaloupeflow(&client, &flow).await?;
    debug!("Updated gpu memory of kantaloupeflow {}/{} to {}", namespace, name, req.gpumemory);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kantaloupeflow::dto::kantaloupeflow_view::{ContainerSpec, ResourceList};
    use k8s_openapi::api::core::v1::{PodSpec, ResourceQuotaStatus};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn flow_view(plugins: Vec<PluginType>, limits: &[(&str, &str)]) -> KantaloupeflowView {
        let mut view = KantaloupeflowView::default();
        view.metadata.name = "notebook".into();
        view.metadata.namespace = "team-a".into();
        view.spec.plugins = plugins;
        view.spec.template.spec.containers.push(ContainerSpec {
            name: "main".into(),
            image: "pytorch:2.3".into(),
            resources: crate::domain::kantaloupeflow::dto::kantaloupeflow_view::ResourceRequirements {
                limits: ResourceList {
                    resources: limits.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        });
        view
    }

    fn env_of(flow: &KantaloupeFlow) -> BTreeMap<String, String> {
        flow.spec.template.spec.as_ref().unwrap().containers[0]
            .env
            .iter()
            .flatten()
            .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_prepare_flow_with_plugins() {
        let view = flow_view(vec![PluginType::Ssh, PluginType::Vscode, PluginType::Jupyter], &[]);
        let flow = prepare_flow(&view, "GENERIC", "3").unwrap();

        assert_eq!(flow.spec.workload, "deployment");
        let ports: Vec<(String, i32)> = flow.spec.networking.iter().map(|n| (n.name.clone(), n.port)).collect();
        assert_eq!(
            ports,
            vec![("sshd".to_string(), 22), ("vscode".to_string(), 6666), ("jupyter".to_string(), 5555)]
        );
        assert_eq!(flow.spec.networking[1].type_, "httproute");
        assert_eq!(flow.spec.networking[1].protocol, "tcp");

        let env = env_of(&flow);
        assert_eq!(env["LIBCUDA_LOG_LEVEL"], "3");
        assert_eq!(env["GPU_CORE_UTILIZATION_POLICY"], "force");
        assert_eq!(env["ROOT_PASSWORD"].len(), 15);
        assert_eq!(env["JUPYTER_TOKEN"].len(), 64);
        assert_eq!(env["ENABLE_CODE_SERVER"], "true");

        let labels = flow.spec.template.metadata.as_ref().unwrap().labels.as_ref().unwrap();
        assert_eq!(labels[KANTALOUPEFLOW_APP_LABEL_KEY], "notebook");
    }

    #[test]
    fn test_prepare_flow_rejects_bad_input() {
        let mut view = flow_view(vec![], &[]);
        view.spec.template.spec.containers.clear();
        assert!(prepare_flow(&view, "", "2").is_err());

        let mut view = flow_view(vec![], &[]);
        view.metadata.name = "Bad_Name".into();
        assert!(prepare_flow(&view, "", "2").is_err());
    }

    #[test]
    fn test_provider_patches() {
        let view = flow_view(vec![], &[("aws.amazon.com/neuroncore", "2")]);
        let flow = prepare_flow(&view, "AWS_EKS", "2").unwrap();
        let pod = flow.spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.scheduler_name.as_deref(), Some("hami-scheduler"));
        assert_eq!(env_of(&flow)["NEURON_PROCESS_TAG"], "team-a/notebook");

        let view = flow_view(vec![], &[("nvidia.com/gpumem", "4096")]);
        let flow = prepare_flow(&view, "GCP_GKE", "2").unwrap();
        let tolerations = flow.spec.template.spec.as_ref().unwrap().tolerations.clone().unwrap();
        assert_eq!(tolerations.len(), 1);
        assert_eq!(tolerations[0].value.as_deref(), Some("present"));

        let view = flow_view(vec![], &[]);
        let flow = prepare_flow(&view, "GCP_GKE", "2").unwrap();
        assert!(flow.spec.template.spec.as_ref().unwrap().tolerations.is_none());
    }

    #[test]
    fn test_allocation_meet() {
        let raw = "4096,2048".to_string();
        assert_eq!(parse_allocation_meet(Some(&raw)).unwrap(), (4096, "4096".to_string()));
        assert!(parse_allocation_meet(None).is_err());
        assert!(parse_allocation_meet(Some(&"4096".to_string())).is_err());
        assert!(parse_allocation_meet(Some(&"x,1".to_string())).is_err());
    }

    #[test]
    fn test_gpu_memory_fits() {
        let mut quota = ResourceQuota::default();
        quota.status = Some(ResourceQuotaStatus {
            hard: Some(BTreeMap::from([(NVIDIA_QUOTA_GPU_MEMORY.to_string(), Quantity("10000".into()))])),
            used: Some(BTreeMap::from([(NVIDIA_QUOTA_GPU_MEMORY.to_string(), Quantity("8000".into()))])),
        });
        let quotas = vec![quota, ResourceQuota::default()];
        assert!(gpu_memory_fits(&quotas, 4000, 6000));
        assert!(!gpu_memory_fits(&quotas, 4000, 6001));
        assert!(gpu_memory_fits(&[], 0, 1 << 20));
    }

    #[test]
    fn test_filter_flows_by_state() {
        let mut running = KantaloupeflowView::default();
        running.metadata.name = "train-a".into();
        running.status.state = KantaloupeflowState::Running;
        let mut failed = KantaloupeflowView::default();
        failed.metadata.name = "train-b".into();
        failed.status.state = KantaloupeflowState::Failed;
        let views = vec![running, failed];

        let filter = KantaloupeflowFilter {
            state: "Running".into(),
            ..Default::default()
        };
        let out = filter_flows(views.clone(), &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].metadata.name, "train-a");

        let filter = KantaloupeflowFilter {
            state: "KANTALOUPEFLOW_STATE_UNSPECIFIED".into(),
            name: "train".into(),
            ..Default::default()
        };
        assert_eq!(filter_flows(views, &filter).len(), 2);
    }

    #[test]
    fn test_flow_sort_direction() {
        let opts = ListOptions::default();
        let by_name = KantaloupeflowFilter {
            sort_by: "field_name".into(),
            ..Default::default()
        };
        let sorted = flow_sort(&by_name, &opts);
        assert_eq!(sorted.sort_field, "metadata.name");
        assert!(sorted.sort_asc);

        let newest_first = KantaloupeflowFilter {
            sort_dir: "desc".into(),
            ..Default::default()
        };
        let sorted = flow_sort(&newest_first, &opts);
        assert_eq!(sorted.sort_field, "metadata.creation_timestamp");
        assert!(!sorted.sort_asc);
    }

    #[test]
    fn test_device_annotations() {
        let mut pod = Pod::default();
        pod.metadata.annotations = Some(BTreeMap::from([
            ("hami.io/Ascend910B-devices-allocated".to_string(), "npu-0,Ascend910B,32768,0:;".to_string()),
            (POD_NEURONS_ANNOTATION.to_string(), "nc-0,Neuron,16384,2:;".to_string()),
        ]));
        let ascend = ascend_gpus(&pod).unwrap();
        assert_eq!(ascend.len(), 2);
        assert!(ascend.iter().any(|g| g.model == "Ascend910B" && g.memory == 32768));

        let neuron = neuron_gpus(&pod).unwrap();
        assert_eq!(neuron, vec![GpuView {
            uuid: "nc-0".into(),
            model: "Neuron".into(),
            memory: 16384,
            core: 2.0,
        }]);
    }

    #[test]
    fn test_tree_counts_pods_per_node() {
        let pod_on = |node: &str| Pod {
            spec: Some(PodSpec {
                node_name: Some(node.to_string()).filter(|n| !n.is_empty()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let pods = vec![pod_on("gpu-1"), pod_on("gpu-2"), pod_on("gpu-1"), pod_on("")];
        let node = tree_node("member-1".into(), &pods);
        assert_eq!(node.value, 4);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].name, "gpu-1");
        assert_eq!(node.children[0].value, 2);
    }

    fn pods_on(nodes: &[&str]) -> Vec<Pod> {
        nodes
            .iter()
            .map(|node| Pod {
                spec: Some(PodSpec {
                    node_name: Some(node.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tree_walks_clusters_concurrently_in_order() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let clusters = ["slow", "fast", "mid"].map(String::from);
        let started = tokio::time::Instant::now();

        let tree = kantaloupe_tree(4, clusters, |name| {
            let (in_flight, peak) = (&in_flight, &peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let (delay, nodes) = match name.as_str() {
                    "slow" => (30, vec!["gpu-1"]),
                    "fast" => (10, vec!["gpu-2", "gpu-2"]),
                    _ => (20, vec![]),
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(pods_on(&nodes))
            }
        })
        .await
        .unwrap();

        let names: Vec<_> = tree.data.iter().map(|n| (n.name.as_str(), n.value)).collect();
        assert_eq!(names, vec![("slow", 1), ("fast", 2), ("mid", 0)]);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() < Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_tree_surfaces_unreachable_cluster() {
        let clusters = ["member-1", "member-2"].map(String::from);
        let err = kantaloupe_tree(2, clusters, |name| async move {
            if name == "member-2" {
                Err(anyhow::Error::from(AppError::Unavailable(format!("cluster {} unreachable", name))))
            } else {
                Ok(Vec::new())
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("member-2"));
    }
}
