//! Member cluster nodes decorated with host and accelerator metrics.

use anyhow::Result;
use kube::ResourceExt;
use tracing::debug;

use crate::core::client::kube_resources::Node;
use crate::core::client::nodes::{fetch_node_by_name, fetch_nodes};
use crate::core::client::prometheus_client::MetricsError;
use crate::core::util::annotations::memory_factor;
use crate::core::util::fanout::try_fan_out;
use crate::core::util::filter::matches_fuzzy;
use crate::core::util::sort::snake_to_camel;
use crate::core::util::validation::{is_valid_label_value, require_dns1035};
use crate::domain::cluster::dto::cluster_request::specified;
use crate::domain::common::model::list::{ListOptions, ListResponse};
use crate::domain::context::ServiceContext;
use crate::domain::monitoring::metrics::{best_effort, MetricsQuerier};
use crate::domain::monitoring::query::{GpuQueryType, MetricQuery, QueryType};
use crate::domain::node::dto::node_request::NodeFilter;
use crate::domain::node::dto::node_view::{
    gpu_summary, node_phase, node_roles, ClusterGpuSummary, NodeMetrics, NodePhase, NodeView, Role,
};

const DEFAULT_SORT_FIELD: &str = "metadata.name";

// ==================== Queries ====================

/// First sample of a node-scope series, 0 when absent or unavailable.
async fn node_value(metrics: &MetricsQuerier, cluster: &str, node: &str, query: QueryType) -> Result<f64, MetricsError> {
    let vector = best_effort("node metric", metrics.vector(&MetricQuery::node(cluster, node, query)).await)?;
    Ok(vector.first().map(|s| s.value).unwrap_or(0.0))
}

async fn node_gpu_count(metrics: &MetricsQuerier, cluster: &str, node: &str) -> Result<i32, MetricsError> {
    let query = MetricQuery::gpu_filtered(cluster, node, "", "", "", GpuQueryType::Count);
    let vector = best_effort("node gpu count", metrics.vector(&query).await)?;
    Ok(vector.first().map(|s| s.value as i32).unwrap_or(0))
}

/// Accelerator figures shown on the node list. Memory total is the allocatable memory
/// divided by the node's oversubscription factor.
pub async fn gpu_metrics(metrics: &MetricsQuerier, cluster: &str, node: &Node) -> Result<NodeMetrics, MetricsError> {
    let name = node.name_any();
    let (count, core_total, core_used, core_allocated, mem_total, mem_used, mem_allocated) = tokio::try_join!(
        node_gpu_count(metrics, cluster, &name),
        node_value(metrics, cluster, &name, QueryType::GpuCoreTotal),
        node_value(metrics, cluster, &name, QueryType::GpuCoreUsed),
        node_value(metrics, cluster, &name, QueryType::GpuCoreAllocated),
        node_value(metrics, cluster, &name, QueryType::GpuMemTotal),
        node_value(metrics, cluster, &name, QueryType::GpuMemUsed),
        node_value(metrics, cluster, &name, QueryType::GpuMemAllocated),
    )?;
    Ok(NodeMetrics {
        gpu_count: count,
        gpu_core_total: core_total,
        gpu_core_usage: core_used,
        gpu_core_allocated: core_allocated,
        gpu_memory_allocatable: mem_total as i64,
        gpu_memory_total: (mem_total / memory_factor(node.annotations())) as i64,
        gpu_memory_usage: mem_used as i64,
        gpu_memory_allocated: mem_allocated as i64,
        ..Default::default()
    })
}

/// [`gpu_metrics`] plus host cpu and memory.
pub async fn full_metrics(metrics: &MetricsQuerier, cluster: &str, node: &Node) -> Result<NodeMetrics, MetricsError> {
    let name = node.name_any();
    let (gpu, cpu_used, cpu_allocated, cpu_total, mem_used, mem_allocated, mem_total) = tokio::try_join!(
        gpu_metrics(metrics, cluster, node),
        node_value(metrics, cluster, &name, QueryType::CpuUsed),
        node_value(metrics, cluster, &name, QueryType::CpuAllocated),
        node_value(metrics, cluster, &name, QueryType::CpuTotal),
        node_value(metrics, cluster, &name, QueryType::MemUsed),
        node_value(metrics, cluster, &name, QueryType::MemAllocated),
        node_value(metrics, cluster, &name, QueryType::MemTotal),
    )?;
    Ok(NodeMetrics {
        cpu_usage: cpu_used,
        cpu_allocated,
        cpu_capacity: cpu_total as i64,
        memory_usage: mem_used,
        memory_allocated: mem_allocated,
        memory_capacity: mem_total as i64,
        ..gpu
    })
}

// ==================== Operations ====================

pub async fn list_nodes(
    ctx: &ServiceContext,
    cluster: &str,
    filter: &NodeFilter,
    opts: &ListOptions,
) -> Result<ListResponse<NodeView>> {
    require_dns1035("cluster name", cluster)?;
    // a name that can never be a node matches nothing
    if !is_valid_label_value(&filter.name) {
        return Ok(ListResponse::paged(Vec::new(), opts.page, opts.page_size));
    }

    let client = ctx.cluster_client(cluster).await?;
    let nodes = filter_nodes(fetch_nodes(&client).await?, filter);
    debug!("Discovered {} node(s) in {}", nodes.len(), cluster);

    let metrics = &ctx.metrics;
    let views = try_fan_out(
        ctx.settings.fanout_limit,
        nodes
            .iter()
            .map(|node| async move { Ok::<_, MetricsError>(NodeView::new(node, gpu_metrics(metrics, cluster, node).await?)) }),
    )
    .await?;

    let mut opts = opts.clone();
    if opts.sort_field.is_empty() {
        opts.sort_field = DEFAULT_SORT_FIELD.to_string();
        opts.sort_asc = true;
    }
    Ok(opts.apply(views, &snake_to_camel)?)
}

pub fn filter_nodes(nodes: Vec<Node>, filter: &NodeFilter) -> Vec<Node> {
    let role = specified(&filter.role).and_then(Role::parse);
    let phase = specified(&filter.phase).and_then(NodePhase::parse);
    nodes
        .into_iter()
        .filter(|n| matches_fuzzy(&n.name_any(), &filter.name))
        .filter(|n| role.map_or(true, |r| node_roles(n).contains(&r)))
        .filter(|n| phase.map_or(true, |p| node_phase(n) == p))
        .collect()
}

pub async fn get_node(ctx: &ServiceContext, cluster: &str, name: &str) -> Result<NodeView> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let node = fetch_node_by_name(&client, name).await?;
    let metrics = full_metrics(&ctx.metrics, cluster, &node).await?;
    Ok(NodeView::new(&node, metrics))
}

pub async fn list_cluster_gpu_summary(ctx: &ServiceContext, cluster: &str) -> Result<ClusterGpuSummary> {
    require_dns1035("cluster name", cluster)?;
    let client = ctx.cluster_client(cluster).await?;
    let nodes = fetch_nodes(&client).await?;
    Ok(gpu_summary(&nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::annotations::MEMORY_SCALE_ANNOTATION;
    use crate::domain::monitoring::metrics::testing::{sample, FakeProm};
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn node(name: &str, ready: bool, labels: &[&str]) -> Node {
        let mut n = Node::default();
        n.metadata.name = Some(name.into());
        n.metadata.labels = Some(labels.iter().map(|l| (l.to_string(), String::new())).collect());
        n.status = Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".into(),
                status: if ready { "True" } else { "False" }.into(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        n
    }

    fn names(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.name_any()).collect()
    }

    #[test]
    fn test_filter_by_role_and_phase() {
        let nodes = vec![
            node("cp-1", true, &["node-role.kubernetes.io/control-plane"]),
            node("gpu-1", true, &[]),
            node("gpu-2", false, &[]),
        ];
        let filter = NodeFilter {
            role: "WORKER".into(),
            phase: "Ready".into(),
            ..Default::default()
        };
        assert_eq!(names(&filter_nodes(nodes.clone(), &filter)), vec!["gpu-1"]);

        let filter = NodeFilter {
            name: "gpu".into(),
            role: "NODE_ROLE_UNSPECIFIED".into(),
            phase: "NODE_PHASE_UNSPECIFIED".into(),
        };
        assert_eq!(names(&filter_nodes(nodes, &filter)), vec!["gpu-1", "gpu-2"]);
    }

    #[tokio::test]
    async fn test_gpu_memory_total_divided_by_factor() {
        let fake = FakeProm::default()
            .with_vector(r#"kantaloupe_node_gpumem_total{cluster="c", node="n1"}"#, vec![sample(&[], 81920.0)])
            .with_vector(r#"kantaloupe_node_gpumem_used{cluster="c", node="n1"}"#, vec![sample(&[], 1024.0)])
            .with_vector(r#"count(kantaloupe_gpu_temp{cluster="c", node="n1"})"#, vec![sample(&[], 8.0)]);
        let metrics = MetricsQuerier::new(Arc::new(fake));

        let mut n = node("n1", true, &[]);
        n.metadata.annotations = Some(BTreeMap::from([(MEMORY_SCALE_ANNOTATION.to_string(), "2".to_string())]));
        let m = gpu_metrics(&metrics, "c", &n).await.unwrap();
        assert_eq!(m.gpu_count, 8);
        assert_eq!(m.gpu_memory_allocatable, 81920);
        assert_eq!(m.gpu_memory_total, 40960);
        assert_eq!(m.gpu_memory_usage, 1024);
        assert_eq!(m.gpu_core_total, 0.0);
    }

    #[tokio::test]
    async fn test_metrics_outage_reads_as_zero() {
        let fake = FakeProm {
            unavailable: true,
            ..Default::default()
        };
        let metrics = MetricsQuerier::new(Arc::new(fake));
        let m = full_metrics(&metrics, "c", &node("n1", true, &[])).await.unwrap();
        assert_eq!(m, NodeMetrics::default());
    }
}
