//! PromQL emitted for the kantaloupe exporter series.
//!
//! Every query is a pure function of a [`MetricQuery`]; label values are escaped before
//! they are quoted so user input never leaves its matcher.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource family of the cluster, node, workload and platform series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    CpuTotal,
    CpuAllocated,
    CpuUsed,
    MemTotal,
    MemAllocated,
    MemUsed,
    GpuCoreTotal,
    GpuCoreAllocated,
    GpuCoreUsed,
    GpuMemTotal,
    GpuMemAllocated,
    GpuMemUsed,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::CpuTotal => "cpu_total",
            QueryType::CpuAllocated => "cpu_allocated",
            QueryType::CpuUsed => "cpu_used",
            QueryType::MemTotal => "mem_total",
            QueryType::MemAllocated => "mem_allocated",
            QueryType::MemUsed => "mem_used",
            QueryType::GpuCoreTotal => "gpucore_total",
            QueryType::GpuCoreAllocated => "gpucore_allocated",
            QueryType::GpuCoreUsed => "gpucore_used",
            QueryType::GpuMemTotal => "gpumem_total",
            QueryType::GpuMemAllocated => "gpumem_allocated",
            QueryType::GpuMemUsed => "gpumem_used",
        }
    }

    /// Host cpu/memory workload series are labelled per pod, not per deployment.
    fn is_pod_scoped(self) -> bool {
        matches!(
            self,
            QueryType::CpuUsed | QueryType::CpuAllocated | QueryType::MemUsed | QueryType::MemAllocated
        )
    }
}

/// Family of the per-card series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuQueryType {
    Count,
    CoreTotal,
    CoreAllocated,
    CoreUsed,
    MemTotal,
    MemAllocated,
    MemUsed,
    Power,
    Temperature,
    Errors,
}

impl GpuQueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            GpuQueryType::Count => "count",
            GpuQueryType::CoreTotal => "core_total",
            GpuQueryType::CoreAllocated => "core_allocated",
            GpuQueryType::CoreUsed => "core_used",
            GpuQueryType::MemTotal => "mem_total",
            GpuQueryType::MemAllocated => "mem_allocated",
            GpuQueryType::MemUsed => "mem_used",
            GpuQueryType::Power => "power",
            GpuQueryType::Temperature => "temp",
            GpuQueryType::Errors => "errors",
        }
    }
}

/// Resource selector used by the trend and ranking endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "RESOURCE_TYPE_CPU", alias = "cpu")]
    Cpu,
    #[serde(rename = "RESOURCE_TYPE_MEMORY", alias = "memory")]
    Memory,
    #[serde(rename = "RESOURCE_TYPE_GPU_CORE", alias = "gpu_core")]
    GpuCore,
    #[serde(rename = "RESOURCE_TYPE_GPU_MEMORY", alias = "gpu_memory")]
    GpuMemory,
    #[serde(rename = "RESOURCE_TYPE_TEMP", alias = "temp")]
    Temperature,
    #[serde(rename = "RESOURCE_TYPE_POWER", alias = "power")]
    Power,
}

/// `total`, `used` and `allocated` families of one resource. Temperature and power only
/// have a `used` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Families<T> {
    pub total: Option<T>,
    pub used: T,
    pub allocated: Option<T>,
}

impl ResourceType {
    /// Families of the cluster, node and workload series. None for card-only resources.
    pub fn query_types(self) -> Option<Families<QueryType>> {
        let (total, used, allocated) = match self {
            ResourceType::Cpu => (QueryType::CpuTotal, QueryType::CpuUsed, QueryType::CpuAllocated),
            ResourceType::Memory => (QueryType::MemTotal, QueryType::MemUsed, QueryType::MemAllocated),
            ResourceType::GpuCore => (
                QueryType::GpuCoreTotal,
                QueryType::GpuCoreUsed,
                QueryType::GpuCoreAllocated,
            ),
            ResourceType::GpuMemory => (
                QueryType::GpuMemTotal,
                QueryType::GpuMemUsed,
                QueryType::GpuMemAllocated,
            ),
            ResourceType::Temperature | ResourceType::Power => return None,
        };
        Some(Families {
            total: Some(total),
            used,
            allocated: Some(allocated),
        })
    }

    /// Families of the per-card series. None for host cpu and memory.
    pub fn gpu_query_types(self) -> Option<Families<GpuQueryType>> {
        match self {
            ResourceType::GpuCore => Some(Families {
                total: Some(GpuQueryType::CoreTotal),
                used: GpuQueryType::CoreUsed,
                allocated: Some(GpuQueryType::CoreAllocated),
            }),
            ResourceType::GpuMemory => Some(Families {
                total: Some(GpuQueryType::MemTotal),
                used: GpuQueryType::MemUsed,
                allocated: Some(GpuQueryType::MemAllocated),
            }),
            ResourceType::Temperature => Some(Families {
                total: None,
                used: GpuQueryType::Temperature,
                allocated: None,
            }),
            ResourceType::Power => Some(Families {
                total: None,
                used: GpuQueryType::Power,
                allocated: None,
            }),
            ResourceType::Cpu | ResourceType::Memory => None,
        }
    }

    /// Metric-name fragment of the node series (`kantaloupe_node_<x>_total`).
    fn node_prefix(self) -> Option<&'static str> {
        match self {
            ResourceType::Cpu => Some("cpu"),
            ResourceType::Memory => Some("mem"),
            ResourceType::GpuCore => Some("gpucore"),
            ResourceType::GpuMemory => Some("gpumem"),
            ResourceType::Temperature | ResourceType::Power => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingType {
    #[serde(rename = "RANKING_TYPE_ALLOCATED", alias = "allocated")]
    Allocated,
    #[default]
    #[serde(rename = "RANKING_TYPE_USED", alias = "used")]
    Used,
}

/// Which card resource a workload ranking is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "CORE", alias = "core")]
    Core,
    #[serde(rename = "MEMORY", alias = "memory")]
    Memory,
}

/// Label matchers keyed by label name. Empty values emit no matcher; a value of the form
/// `~"<pattern>"` is emitted verbatim as a regex matcher, anything else is quoted.
///
/// A `~` value whose remainder is not one well-formed quoted literal (`~web.+`, or
/// `~"a"} or up{"`) is not passed through raw. It becomes an equality matcher on the whole
/// value, tilde included and escaped, so a caller-supplied string can never extend the
/// selector. Use [`LabelMatchers::with_regex`] to build a regex matcher from a bare pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMatchers(BTreeMap<&'static str, String>);

impl LabelMatchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    /// `name=~"<pattern>"`; the pattern is escaped like any quoted value.
    pub fn with_regex(self, name: &'static str, pattern: &str) -> Self {
        let value = format!("~{}", quote(pattern));
        self.with(name, value)
    }
}

impl fmt::Display for LabelMatchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matchers: Vec<String> = self
            .0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| {
                if v.strip_prefix('~').is_some_and(is_quoted_literal) {
                    format!("{}={}", k, v)
                } else {
                    format!("{}={}", k, quote(v))
                }
            })
            .collect();
        if matchers.is_empty() {
            return Ok(());
        }
        write!(f, "{{{}}}", matchers.join(", "))
    }
}

/// `"..."` with every inner quote escaped, so it cannot close the matcher early.
fn is_quoted_literal(s: &str) -> bool {
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return false;
    };
    let mut escaped = false;
    for c in inner.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return false,
            _ => {}
        }
    }
    !escaped
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// One series selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricQuery {
    Platform(QueryType),
    Cluster {
        cluster: String,
        query: QueryType,
    },
    Node {
        cluster: String,
        node: String,
        query: QueryType,
    },
    Workload {
        cluster: String,
        node: String,
        namespace: String,
        name: String,
        query: QueryType,
    },
    Gpu {
        cluster: String,
        node: String,
        vendor: String,
        model: String,
        uuid: String,
        query: GpuQueryType,
    },
}

impl MetricQuery {
    pub fn cluster(cluster: &str, query: QueryType) -> Self {
        MetricQuery::Cluster {
            cluster: cluster.to_string(),
            query,
        }
    }

    pub fn node(cluster: &str, node: &str, query: QueryType) -> Self {
        MetricQuery::Node {
            cluster: cluster.to_string(),
            node: node.to_string(),
            query,
        }
    }

    pub fn workload(cluster: &str, node: &str, namespace: &str, name: &str, query: QueryType) -> Self {
        MetricQuery::Workload {
            cluster: cluster.to_string(),
            node: node.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            query,
        }
    }

    pub fn gpu(cluster: &str, uuid: &str, query: GpuQueryType) -> Self {
        Self::gpu_filtered(cluster, "", "", "", uuid, query)
    }

    pub fn gpu_filtered(
        cluster: &str,
        node: &str,
        vendor: &str,
        model: &str,
        uuid: &str,
        query: GpuQueryType,
    ) -> Self {
        MetricQuery::Gpu {
            cluster: cluster.to_string(),
            node: node.to_string(),
            vendor: vendor.to_string(),
            model: model.to_string(),
            uuid: uuid.to_string(),
            query,
        }
    }

    /// The instant selector.
    pub fn promql(&self) -> String {
        match self {
            MetricQuery::Platform(query) => format!("kantaloupe_global_{}", query.as_str()),
            MetricQuery::Cluster { cluster, query } => {
                let labels = LabelMatchers::new().with("cluster", cluster.as_str());
                format!("kantaloupe_cluster_{}{}", query.as_str(), labels)
            }
            MetricQuery::Node { cluster, node, query } => {
                let labels = LabelMatchers::new()
                    .with("cluster", cluster.as_str())
                    .with("node", node.as_str());
                format!("kantaloupe_node_{}{}", query.as_str(), labels)
            }
            MetricQuery::Workload {
                cluster,
                node,
                namespace,
                name,
                query,
            } => {
                let mut labels = LabelMatchers::new()
                    .with("cluster", cluster.as_str())
                    .with("node", node.as_str());
                if query.is_pod_scoped() {
                    labels = labels.with("namespace", namespace.as_str());
                    if !name.is_empty() {
                        labels = labels.with_regex("pod", &format!("{}.+", name));
                    }
                } else if !namespace.is_empty() && !name.is_empty() {
                    labels = labels.with("deployment", format!("{}/{}", namespace, name));
                }
                format!("kantaloupe_workload_{}{}", query.as_str(), labels)
            }
            MetricQuery::Gpu {
                cluster,
                node,
                vendor,
                model,
                uuid,
                query,
            } => {
                let labels = LabelMatchers::new()
                    .with("cluster", cluster.as_str())
                    .with("node", node.as_str())
                    .with("vendor", vendor.as_str())
                    .with("modelName", model.as_str())
                    .with("UUID", uuid.as_str());
                match query {
                    GpuQueryType::Count => format!("count(kantaloupe_gpu_temp{})", labels),
                    _ => format!("kantaloupe_gpu_{}{}", query.as_str(), labels),
                }
            }
        }
    }

    /// The selector summed into a single stream, used for range queries.
    pub fn summed(&self) -> String {
        format!("sum({})", self.promql())
    }
}

// ==================== Aggregate queries ====================

/// `topk` of per-node usage or allocation ratio in percent.
pub fn top_nodes_query(
    resource: ResourceType,
    ranking: RankingType,
    cluster: &str,
    limit: u32,
) -> Option<String> {
    let prefix = resource.node_prefix()?;
    let labels = LabelMatchers::new().with("cluster", cluster);
    let family = match ranking {
        RankingType::Allocated => "allocated",
        RankingType::Used => "used",
    };
    // gpu series carry extra labels, so match on node only
    let on = match resource {
        ResourceType::GpuCore | ResourceType::GpuMemory => "on(node) ",
        _ => "",
    };
    Some(format!(
        "topk({}, kantaloupe_node_{}_{}{} / {}kantaloupe_node_{}_total{} * 100)",
        limit, prefix, family, labels, on, prefix, labels
    ))
}

/// One sample per workload allocation, with value 1.
pub fn workload_presence_query(cluster: &str) -> String {
    let labels = LabelMatchers::new().with("cluster", cluster);
    format!("kantaloupe_workload_gpucore_allocated{} * 0 + 1", labels)
}

/// Workload count per device on one node.
pub fn node_device_workloads_query(cluster: &str, node: &str) -> String {
    let labels = LabelMatchers::new()
        .with("cluster", cluster)
        .with("nodename", node);
    format!("count(vGPUPodsDeviceAllocated{}) by (deviceuuid)", labels)
}

/// Device memory breakdown of one deployment.
pub fn memory_distribution_query(cluster: &str, namespace: &str, name: &str) -> String {
    let labels = LabelMatchers::new()
        .with("cluster", cluster)
        .with("deployment", format!("{}/{}", namespace, name));
    format!("Device_memory_desc_of_container{}", labels)
}

/// Average core usage per deployment over `window`.
pub fn workload_core_usage_over(cluster: &str, window: &str) -> String {
    let labels = LabelMatchers::new().with("cluster", cluster);
    format!(
        "avg_over_time(sum by (deployment) (kantaloupe_workload_gpucore_used{})[{}:])",
        labels, window
    )
}

/// Average memory used/allocated ratio per deployment over `window`.
pub fn workload_memory_usage_over(cluster: &str, window: &str) -> String {
    let labels = LabelMatchers::new().with("cluster", cluster);
    format!(
        "avg_over_time(sum by (deployment) (kantaloupe_workload_gpumem_used{labels})[{window}:]) \
         / avg_over_time(sum by (deployment) (kantaloupe_workload_gpumem_allocated{labels})[{window}:])",
        labels = labels,
        window = window
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_emit_no_matcher() {
        let labels = LabelMatchers::new().with("cluster", "a").with("node", "");
        assert_eq!(labels.to_string(), r#"{cluster="a"}"#);
        assert_eq!(LabelMatchers::new().with("node", "").to_string(), "");
    }

    #[test]
    fn test_tilde_values_are_not_quoted() {
        let labels = LabelMatchers::new().with("pod", r#"~"web.+""#);
        assert_eq!(labels.to_string(), r#"{pod=~"web.+"}"#);
    }

    #[test]
    fn test_unquoted_tilde_value_is_an_equality_matcher() {
        let labels = LabelMatchers::new().with("pod", "~web.+");
        assert_eq!(labels.to_string(), r#"{pod="~web.+"}"#);

        let labels = LabelMatchers::new().with_regex("pod", "web.+");
        assert_eq!(labels.to_string(), r#"{pod=~"web.+"}"#);
    }

    #[test]
    fn test_malformed_regex_values_are_quoted() {
        let labels = LabelMatchers::new().with("node", r#"~"a"} or up{"#);
        assert_eq!(labels.to_string(), r#"{node="~\"a\"} or up{"}"#);
    }

    #[test]
    fn test_quotes_are_escaped() {
        let labels = LabelMatchers::new().with("cluster", r#"a"} or vector(1) #"#);
        assert_eq!(labels.to_string(), r#"{cluster="a\"} or vector(1) #"}"#);
    }

    #[test]
    fn test_cluster_and_node_queries() {
        assert_eq!(
            MetricQuery::cluster("alpha", QueryType::GpuMemUsed).promql(),
            r#"kantaloupe_cluster_gpumem_used{cluster="alpha"}"#
        );
        assert_eq!(
            MetricQuery::node("alpha", "n1", QueryType::CpuTotal).summed(),
            r#"sum(kantaloupe_node_cpu_total{cluster="alpha", node="n1"})"#
        );
        assert_eq!(
            MetricQuery::Platform(QueryType::GpuCoreTotal).promql(),
            "kantaloupe_global_gpucore_total"
        );
    }

    #[test]
    fn test_workload_query_scopes() {
        assert_eq!(
            MetricQuery::workload("c", "", "ns", "web", QueryType::MemUsed).promql(),
            r#"kantaloupe_workload_mem_used{cluster="c", namespace="ns", pod=~"web.+"}"#
        );
        assert_eq!(
            MetricQuery::workload("c", "", "ns", "web", QueryType::GpuCoreUsed).promql(),
            r#"kantaloupe_workload_gpucore_used{cluster="c", deployment="ns/web"}"#
        );
        assert_eq!(
            MetricQuery::workload("c", "", "", "", QueryType::GpuMemAllocated).promql(),
            r#"kantaloupe_workload_gpumem_allocated{cluster="c"}"#
        );
    }

    #[test]
    fn test_gpu_queries() {
        assert_eq!(
            MetricQuery::gpu("c", "GPU-1", GpuQueryType::Temperature).promql(),
            r#"kantaloupe_gpu_temp{UUID="GPU-1", cluster="c"}"#
        );
        assert_eq!(
            MetricQuery::gpu_filtered("c", "n1", "NVIDIA", "", "", GpuQueryType::Count).promql(),
            r#"count(kantaloupe_gpu_temp{cluster="c", node="n1", vendor="NVIDIA"})"#
        );
    }

    #[test]
    fn test_top_nodes_query() {
        assert_eq!(
            top_nodes_query(ResourceType::Cpu, RankingType::Used, "c", 5).unwrap(),
            r#"topk(5, kantaloupe_node_cpu_used{cluster="c"} / kantaloupe_node_cpu_total{cluster="c"} * 100)"#
        );
        assert_eq!(
            top_nodes_query(ResourceType::GpuMemory, RankingType::Allocated, "c", 3).unwrap(),
            r#"topk(3, kantaloupe_node_gpumem_allocated{cluster="c"} / on(node) kantaloupe_node_gpumem_total{cluster="c"} * 100)"#
        );
        assert!(top_nodes_query(ResourceType::Power, RankingType::Used, "c", 3).is_none());
    }

    #[test]
    fn test_resource_families() {
        let temp = ResourceType::Temperature.gpu_query_types().unwrap();
        assert_eq!(temp.total, None);
        assert_eq!(temp.used, GpuQueryType::Temperature);
        assert!(ResourceType::Cpu.gpu_query_types().is_none());
        assert_eq!(
            ResourceType::GpuCore.query_types().unwrap().allocated,
            Some(QueryType::GpuCoreAllocated)
        );
    }
}
