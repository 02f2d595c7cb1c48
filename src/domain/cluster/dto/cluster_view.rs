use serde::Serialize;

use crate::core::crd::cluster::{Cluster, ResourceSummary};
use crate::core::util::constants::{CLUSTER_ALIAS_ANNOTATION_KEY, CLUSTER_DESCRIPTION_ANNOTATION_KEY};
use crate::core::util::quantity::quantity_value;
use crate::domain::cluster::dto::cluster_request::ClusterState;
use crate::domain::common::model::meta::{ConditionView, ObjectMeta};

const GPU_COUNT_KEY: &str = "nvidia.com/gpu.count";
const GPU_MEMORY_COUNT_KEY: &str = "nvidia.com/gpu-memory.count";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub metadata: ObjectMeta,
    pub spec: ClusterSpecView,
    pub status: ClusterStatusView,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpecView {
    pub provider: String,
    #[serde(rename = "type")]
    pub cluster_type: String,
    pub api_endpoint: String,
    pub alias_name: String,
    pub description: String,
    pub prometheus_address: String,
    pub gateway_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusView {
    pub kubernetes_version: String,
    pub kube_system_id: String,
    pub node_summary: ResourceSummaryView,
    pub pod_summary: ResourceSummaryView,
    pub kantaloupeflow_summary: ResourceSummaryView,
    pub conditions: Vec<ConditionView>,
    pub state: ClusterState,
    pub gpu_total: i32,
    pub gpu_memory_total: i64,
    pub cpu_total: i32,
    pub memory_total: i64,
    /// Absent for clusters that are not ready or were not enriched.
    pub metrics: Option<ClusterMetrics>,
}

/// Usage and allocation of a cluster in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub gpu_core_usage: f64,
    pub gpu_memory_usage: f64,
    pub gpu_core_allocated: f64,
    pub gpu_memory_allocated: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummaryView {
    pub total_num: i32,
    pub ready_num: i32,
}

impl From<Option<&ResourceSummary>> for ResourceSummaryView {
    fn from(summary: Option<&ResourceSummary>) -> Self {
        match summary {
            Some(s) => Self {
                total_num: s.total_num,
                ready_num: s.ready_num,
            },
            None => Self {
                total_num: -1,
                ready_num: -1,
            },
        }
    }
}

pub fn cluster_state(cluster: &Cluster) -> ClusterState {
    if cluster.is_ready() {
        ClusterState::Running
    } else {
        ClusterState::Unhealth
    }
}

impl ClusterView {
    pub fn new(cluster: &Cluster, metrics: Option<ClusterMetrics>) -> Self {
        let metadata = ObjectMeta::from(&cluster.metadata);
        let annotation = |key: &str| metadata.annotations.get(key).cloned().unwrap_or_default();
        let spec = ClusterSpecView {
            provider: cluster.spec.provider.clone(),
            cluster_type: cluster.spec.type_.clone(),
            api_endpoint: cluster.spec.api_endpoint.clone(),
            alias_name: annotation(CLUSTER_ALIAS_ANNOTATION_KEY),
            description: annotation(CLUSTER_DESCRIPTION_ANNOTATION_KEY),
            prometheus_address: cluster.spec.prometheus_address.clone(),
            gateway_address: cluster.spec.gateway_address.clone(),
        };

        let status = cluster.status.clone().unwrap_or_default();
        let mut view = ClusterStatusView {
            kubernetes_version: status.kubernetes_version.clone(),
            kube_system_id: status.kube_system_id.clone(),
            node_summary: status.node_summary.as_ref().into(),
            pod_summary: status.pod_set_summary.as_ref().into(),
            kantaloupeflow_summary: status.kantaloupeflow_summary.as_ref().into(),
            conditions: status.conditions.iter().map(ConditionView::from).collect(),
            state: cluster_state(cluster),
            gpu_total: 0,
            gpu_memory_total: 0,
            cpu_total: 0,
            memory_total: 0,
            metrics,
        };

        if let Some(summary) = status.resource_summary.as_ref() {
            let allocatable = &summary.allocatable;
            if let Some(q) = allocatable.get(GPU_COUNT_KEY) {
                view.gpu_total = quantity_value(q) as i32;
            }
            if let Some(q) = allocatable.get(GPU_MEMORY_COUNT_KEY) {
                view.gpu_memory_total = quantity_value(q);
            }
            if let Some(q) = allocatable.get("cpu") {
                view.cpu_total = quantity_value(q) as i32;
            }
            if let Some(q) = allocatable.get("memory") {
                view.memory_total = quantity_value(q);
            }
        }

        Self {
            metadata,
            spec,
            status: view,
        }
    }
}

// ==================== Platform ====================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummary {
    pub cluster_num: i32,
    pub node_num: i32,
    pub kantaloupeflow_num: i32,
    pub accelerator_card_num: i32,
    pub accelerator_card_summary: Vec<AcceleratorCardSummary>,
}

/// Per-model card counts across the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorCardSummary {
    pub model: String,
    pub total_num: i32,
    pub usage_num: i32,
    pub idle_num: i32,
}

/// Per-model averages, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuSummary {
    pub model: String,
    pub total: i32,
    pub mem_allocated: f64,
    pub mem_usage: f64,
    pub core_allocated: f64,
    pub core_usage: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuTop {
    pub gpus: Vec<GpuSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersions {
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub validate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginName {
    Hami,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPlugin {
    pub name: PluginName,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPlugins {
    pub plugins: Vec<ClusterPlugin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRequestType {
    pub request_type: String,
    pub resource_names: Vec<ResourceName>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceName {
    pub card_model: String,
    pub resource_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRequestTypes {
    pub request_types: Vec<CardRequestType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crd::cluster::{ClusterResourceSummary, ClusterSpec, ClusterStatus};
    use crate::core::crd::Condition;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    #[test]
    fn test_view_reads_totals_and_annotations() {
        let mut cluster = Cluster::new(
            "alpha",
            ClusterSpec {
                provider: "GENERIC".into(),
                type_: "NVIDIA".into(),
                ..Default::default()
            },
        );
        cluster.metadata.annotations = Some(BTreeMap::from([(
            CLUSTER_ALIAS_ANNOTATION_KEY.to_string(),
            "Alpha".to_string(),
        )]));
        cluster.status = Some(ClusterStatus {
            conditions: vec![Condition {
                type_: "Ready".into(),
                status: "True".into(),
                ..Default::default()
            }],
            resource_summary: Some(ClusterResourceSummary {
                allocatable: BTreeMap::from([
                    (GPU_COUNT_KEY.to_string(), Quantity("8".into())),
                    ("memory".to_string(), Quantity("1Gi".into())),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        });

        let view = ClusterView::new(&cluster, None);
        assert_eq!(view.spec.alias_name, "Alpha");
        assert_eq!(view.spec.description, "");
        assert_eq!(view.status.state, ClusterState::Running);
        assert_eq!(view.status.gpu_total, 8);
        assert_eq!(view.status.memory_total, 1 << 30);
        assert_eq!(view.status.node_summary, ResourceSummaryView { total_num: -1, ready_num: -1 });
        assert!(view.status.metrics.is_none());
    }

    #[test]
    fn test_unready_cluster_is_unhealth() {
        let cluster = Cluster::new("beta", ClusterSpec::default());
        assert_eq!(cluster_state(&cluster), ClusterState::Unhealth);
    }
}
