//! Trend, distribution and ranking endpoints backed by the metrics endpoint.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::client::kantaloupeflows::fetch_kantaloupeflows;
use crate::core::client::prometheus_client::{MetricsError, Vector};
use crate::core::util::constants::SELECT_ALL;
use crate::core::util::fanout::try_fan_out;
use crate::core::util::time_range::AlignedRange;
use crate::core::util::validation::require_dns1035;
use crate::domain::context::ServiceContext;
use crate::domain::monitoring::distribution::{
    cluster_distribution, filter_workloads, memory_distribution, node_distribution,
    rank_card_workloads, top_n_after_total, DistributionPoint, DistributionPoint64, WorkloadInfo,
};
use crate::domain::monitoring::dto::monitoring_request::{
    aligned_range, top_k_limit, CardTopWorkloadsQuery, LimitQuery, TopNodesQuery, TrendQuery,
    WorkloadsTopQuery,
};
use crate::domain::monitoring::metrics::{group_and_sort_vector, MetricsQuerier};
use crate::domain::monitoring::query::{
    memory_distribution_query, node_device_workloads_query, top_nodes_query,
    workload_core_usage_over, workload_memory_usage_over, workload_presence_query, Families,
    GpuQueryType, MetricQuery, QueryType, RequestType,
};
use crate::domain::monitoring::series::{
    series_from_matrix, usage_trend, workload_usage_trend, ResourceTrend, TimeSeries,
};
use crate::errors::invalid_argument;

const DEPLOYMENT_LABEL: &str = "deployment";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub data: Vec<DistributionPoint>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDistribution {
    pub data: Vec<DistributionPoint64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTopWorkloads {
    pub workloads: Vec<WorkloadInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadsTop {
    pub data: Vec<TimeSeries>,
}

/// Which series a trend is read from.
#[derive(Debug, Clone)]
pub enum TrendScope {
    Platform,
    Cluster { cluster: String },
    Node { cluster: String, node: String },
}

impl TrendScope {
    fn query(&self, query: QueryType) -> MetricQuery {
        match self {
            TrendScope::Platform => MetricQuery::Platform(query),
            TrendScope::Cluster { cluster } => MetricQuery::cluster(cluster, query),
            TrendScope::Node { cluster, node } => MetricQuery::node(cluster, node, query),
        }
    }

    fn cluster(&self) -> Option<&str> {
        match self {
            TrendScope::Platform => None,
            TrendScope::Cluster { cluster } | TrendScope::Node { cluster, .. } => Some(cluster),
        }
    }
}

// ==================== Trends ====================

/// Allocated and used percentages of a resource over time.
pub async fn get_resource_trend(ctx: &ServiceContext, scope: TrendScope, req: TrendQuery) -> Result<ResourceTrend> {
    if let Some(cluster) = scope.cluster() {
        require_dns1035("cluster name", cluster)?;
    }
    let Some(Families {
        total: Some(total),
        used,
        allocated: Some(allocated),
    }) = req.resource_type.query_types()
    else {
        return Err(invalid_argument(format!(
            "resource type {:?} has no cluster-level trend",
            req.resource_type
        )));
    };

    let range = req.aligned();
    let (total_q, used_q, allocated_q) = (scope.query(total), scope.query(used), scope.query(allocated));
    let (total, used, allocated) = tokio::try_join!(
        ctx.metrics.summed_range(&total_q, &range),
        ctx.metrics.summed_range(&used_q, &range),
        ctx.metrics.summed_range(&allocated_q, &range),
    )?;
    Ok(usage_trend(total, allocated, used, &range))
}

/// Trend of one card. Temperature and power come back as a single `used` series.
pub async fn get_gpu_trend(ctx: &ServiceContext, cluster: &str, uuid: &str, req: TrendQuery) -> Result<ResourceTrend> {
    require_dns1035("cluster name", cluster)?;
    let families = req.resource_type.gpu_query_types().ok_or_else(|| {
        invalid_argument(format!("resource type {:?} has no card-level trend", req.resource_type))
    })?;
    let range = req.aligned();
    let gpu = |q: GpuQueryType| MetricQuery::gpu(cluster, uuid, q);

    match (families.total, families.allocated) {
        (Some(total), Some(allocated)) => {
            let (total_q, used_q, allocated_q) = (gpu(total), gpu(families.used), gpu(allocated));
            let (total, used, allocated) = tokio::try_join!(
                ctx.metrics.summed_range(&total_q, &range),
                ctx.metrics.summed_range(&used_q, &range),
                ctx.metrics.summed_range(&allocated_q, &range),
            )?;
            Ok(usage_trend(total, allocated, used, &range))
        }
        _ => {
            let used = ctx.metrics.summed_range(&gpu(families.used), &range).await?;
            Ok(ResourceTrend {
                data: vec![series_from_matrix(used, &range, "used")],
            })
        }
    }
}

/// Used share of a kantaloupeflow's allocation over time.
pub async fn get_kantaloupeflow_trend(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
    req: TrendQuery,
) -> Result<ResourceTrend> {
    require_workload_ref(cluster, namespace, name)?;
    let families = req.resource_type.query_types().ok_or_else(|| {
        invalid_argument(format!("resource type {:?} has no workload trend", req.resource_type))
    })?;
    let allocated_type = families.allocated.unwrap_or(families.used);
    let range = req.aligned();
    let workload = |q: QueryType| MetricQuery::workload(cluster, "", namespace, name, q);

    let (used_q, allocated_q) = (workload(families.used), workload(allocated_type));
    let (used, allocated) = tokio::try_join!(
        ctx.metrics.summed_range(&used_q, &range),
        ctx.metrics.summed_range(&allocated_q, &range),
    )?;
    Ok(workload_usage_trend(allocated, used, &range, "used"))
}

// ==================== Distributions ====================

/// Workload count per card of one node.
pub async fn get_node_workload_distribution(ctx: &ServiceContext, cluster: &str, node: &str) -> Result<Distribution> {
    require_dns1035("cluster name", cluster)?;
    let Some(vector) = unless_unconfigured(ctx.metrics.query_vector(&node_device_workloads_query(cluster, node)).await)? else {
        return Ok(Distribution::default());
    };

    let per_device: HashMap<String, i32> = vector
        .iter()
        .map(|s| (s.label("deviceuuid").to_string(), s.value as i32))
        .collect();
    Ok(Distribution {
        data: node_distribution(per_device),
    })
}

/// Nodes bucketed by how many kantaloupeflow workloads they run.
pub async fn get_cluster_workload_distribution(ctx: &ServiceContext, cluster: &str) -> Result<Distribution> {
    require_dns1035("cluster name", cluster)?;
    let Some(vector) = unless_unconfigured(ctx.metrics.query_vector(&workload_presence_query(cluster)).await)? else {
        return Ok(Distribution::default());
    };

    let known = known_workloads(ctx, cluster).await?;
    let workloads = filter_workloads(&known, vector, DEPLOYMENT_LABEL);
    let per_node: HashMap<String, i32> = group_and_sort_vector(&workloads, "node", true)
        .into_iter()
        .map(|(node, count)| (node, count as i32))
        .collect();
    Ok(Distribution {
        data: cluster_distribution(&per_node),
    })
}

/// Device memory of a kantaloupeflow split into context, data and module bytes.
pub async fn get_kantaloupeflow_memory_distribution(
    ctx: &ServiceContext,
    cluster: &str,
    namespace: &str,
    name: &str,
) -> Result<MemoryDistribution> {
    require_workload_ref(cluster, namespace, name)?;
    let vector = ctx
        .metrics
        .query_vector(&memory_distribution_query(cluster, namespace, name))
        .await?;
    Ok(MemoryDistribution {
        data: memory_distribution(&vector)?,
    })
}

// ==================== Rankings ====================

/// Nodes with the highest used or allocated share of a resource.
pub async fn get_top_nodes(ctx: &ServiceContext, cluster: &str, req: TopNodesQuery) -> Result<Distribution> {
    require_dns1035("cluster name", cluster)?;
    let query = top_nodes_query(req.resource_type, req.ranking_type, cluster, top_k_limit(req.limit))
        .ok_or_else(|| invalid_argument(format!("unsupported resource type: {:?}", req.resource_type)))?;

    let Some(vector) = unless_unconfigured(ctx.metrics.query_vector(&query).await)? else {
        return Ok(Distribution::default());
    };
    let data = vector
        .iter()
        .map(|s| {
            let name = match s.label("node") {
                "" => s.label("nodename"),
                node => node,
            };
            DistributionPoint {
                name: name.to_string(),
                value: s.value as i32,
            }
        })
        .collect();
    Ok(Distribution { data })
}

/// Nodes running the most kantaloupeflow workloads.
pub async fn get_top_node_workloads(ctx: &ServiceContext, cluster: &str, req: LimitQuery) -> Result<Distribution> {
    require_dns1035("cluster name", cluster)?;
    let Some(vector) = unless_unconfigured(ctx.metrics.query_vector(&workload_presence_query(cluster)).await)? else {
        return Ok(Distribution::default());
    };

    let known = known_workloads(ctx, cluster).await?;
    let workloads = filter_workloads(&known, vector, DEPLOYMENT_LABEL);
    let data = group_and_sort_vector(&workloads, "node", false)
        .into_iter()
        .take(top_k_limit(req.limit) as usize)
        .map(|(name, count)| DistributionPoint {
            name,
            value: count as i32,
        })
        .collect();
    Ok(Distribution { data })
}

/// Workloads holding the largest share of one card.
pub async fn get_card_top_workloads(
    ctx: &ServiceContext,
    cluster: &str,
    uuid: &str,
    req: CardTopWorkloadsQuery,
) -> Result<CardTopWorkloads> {
    require_dns1035("cluster name", cluster)?;
    let known = known_workloads(ctx, cluster).await?;

    let (allocated_type, used_type) = match req.request_type {
        RequestType::Core => (QueryType::GpuCoreAllocated, QueryType::GpuCoreUsed),
        RequestType::Memory => (QueryType::GpuMemAllocated, QueryType::GpuMemUsed),
    };
    let memory_total = match req.request_type {
        RequestType::Core => 0.0,
        RequestType::Memory => {
            let total = ctx.metrics.one(&MetricQuery::gpu(cluster, uuid, GpuQueryType::MemTotal)).await?;
            total.value
        }
    };

    let allocated = ctx
        .metrics
        .vector(&MetricQuery::workload(cluster, "", "", "", allocated_type))
        .await?;
    let used = ctx
        .metrics
        .map_by(&MetricQuery::workload(cluster, "", "", "", used_type), DEPLOYMENT_LABEL)
        .await?;

    let allocated = filter_workloads(&known, allocated, DEPLOYMENT_LABEL);
    let (workloads, total) = rank_card_workloads(
        req.request_type,
        uuid,
        &allocated,
        &used,
        memory_total,
        req.limit as usize,
    );
    Ok(CardTopWorkloads { workloads, total })
}

/// The busiest kantaloupeflows over a window, each with its own trend.
pub async fn get_cluster_workloads_top(ctx: &ServiceContext, cluster: &str, req: WorkloadsTopQuery) -> Result<WorkloadsTop> {
    require_dns1035("cluster name", cluster)?;
    let window = if req.range.is_empty() { "1h" } else { req.range.as_str() };
    let range = aligned_range(0, 0, window, req.step);

    let ranking = match req.request_type {
        RequestType::Core => workload_core_usage_over(cluster, window),
        RequestType::Memory => workload_memory_usage_over(cluster, window),
    };
    let vector = ctx.metrics.query_vector(&ranking).await?;
    let known = known_workloads(ctx, cluster).await?;
    let top = top_n_after_total(filter_workloads(&known, vector, DEPLOYMENT_LABEL), req.limit as usize);

    let targets: Vec<(String, String, String)> = top
        .iter()
        .filter_map(|s| {
            let name = s.label(DEPLOYMENT_LABEL);
            match name.split('/').collect::<Vec<_>>().as_slice() {
                [ns, workload] => Some((name.to_string(), ns.to_string(), workload.to_string())),
                _ => {
                    info!(name = %name, "invalid workload name");
                    None
                }
            }
        })
        .collect();

    let metrics = &ctx.metrics;
    let range = &range;
    let kind = req.request_type;
    let series = try_fan_out(
        ctx.settings.fanout_limit,
        targets
            .iter()
            .map(|(name, ns, workload)| workload_series(metrics, cluster, ns, workload, name, kind, range)),
    )
    .await?;

    Ok(WorkloadsTop {
        data: series.into_iter().flatten().collect(),
    })
}

async fn workload_series(
    metrics: &MetricsQuerier,
    cluster: &str,
    namespace: &str,
    workload: &str,
    name: &str,
    kind: RequestType,
    range: &AlignedRange,
) -> Result<Vec<TimeSeries>, MetricsError> {
    let query = |q: QueryType| MetricQuery::workload(cluster, "", namespace, workload, q);
    match kind {
        RequestType::Core => {
            let used = metrics.summed_range(&query(QueryType::GpuCoreUsed), range).await?;
            Ok(vec![series_from_matrix(used, range, name)])
        }
        RequestType::Memory => {
            let (used_q, allocated_q) = (query(QueryType::GpuMemUsed), query(QueryType::GpuMemAllocated));
            let (used, allocated) = tokio::try_join!(
                metrics.summed_range(&used_q, range),
                metrics.summed_range(&allocated_q, range),
            )?;
            Ok(workload_usage_trend(allocated, used, range, name).data)
        }
    }
}

// ==================== Helpers ====================

/// `namespace/name` of every kantaloupeflow in the cluster.
async fn known_workloads(ctx: &ServiceContext, cluster: &str) -> Result<HashSet<String>> {
    let client = ctx.cluster_client(cluster).await?;
    let flows = fetch_kantaloupeflows(&client, SELECT_ALL).await?;
    Ok(flows
        .iter()
        .map(|f| format!("{}/{}", f.namespace().unwrap_or_default(), f.name_any()))
        .collect())
}

/// An unconfigured metrics endpoint reads as "nothing to show"; other errors propagate.
fn unless_unconfigured(result: Result<Vector, MetricsError>) -> Result<Option<Vector>> {
    match result {
        Ok(vector) => Ok(Some(vector)),
        Err(MetricsError::ClientUninitialized) => {
            debug!("metrics client is not configured");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn require_workload_ref(cluster: &str, namespace: &str, name: &str) -> Result<()> {
    if cluster.is_empty() || namespace.is_empty() || name.is_empty() {
        return Err(invalid_argument("the cluster, namespace and name can not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_metrics_read_as_empty() {
        assert!(unless_unconfigured(Err(MetricsError::ClientUninitialized)).unwrap().is_none());
        assert!(unless_unconfigured(Err(MetricsError::Timeout("slow".into()))).is_err());
        assert_eq!(unless_unconfigured(Ok(Vec::new())).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_workload_ref_required() {
        assert!(require_workload_ref("c", "ns", "web").is_ok());
        let err = require_workload_ref("c", "", "web").unwrap_err();
        assert_eq!(crate::errors::classify(err).code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_trend_scope_queries() {
        let scope = TrendScope::Node {
            cluster: "alpha".into(),
            node: "n1".into(),
        };
        assert_eq!(
            scope.query(QueryType::CpuUsed).summed(),
            r#"sum(kantaloupe_node_cpu_used{cluster="alpha", node="n1"})"#
        );
        assert_eq!(TrendScope::Platform.cluster(), None);
    }
}
