use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::client::kube_resources::Node;
use crate::core::util::annotations::{nvidia_register_types, NODE_NVIDIA_GPU_ANNOTATION};
use crate::core::util::constants::{CONTROL_PLANE_LABEL_KEY, MASTER_LABEL_KEY, WORKER_LABEL_KEY};
use crate::domain::common::model::meta::ObjectMeta;

const SCHEDULING_DISABLED: &str = "SchedulingDisabled";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePhase {
    #[default]
    #[serde(rename = "NODE_PHASE_UNSPECIFIED")]
    Unspecified,
    Ready,
    #[serde(rename = "Not_Ready")]
    NotReady,
    Unknown,
}

impl NodePhase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Ready" => Some(NodePhase::Ready),
            "Not_Ready" => Some(NodePhase::NotReady),
            "Unknown" => Some(NodePhase::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    ControlPlane,
    Worker,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CONTROL_PLANE" => Some(Role::ControlPlane),
            "WORKER" => Some(Role::Worker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub type_: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpecView {
    #[serde(rename = "podCIDR")]
    pub pod_cidr: String,
    pub unschedulable: bool,
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub update_timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConditionStatus {
    pub phase: NodePhase,
    pub conditions: Vec<NodeCondition>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    pub kernel_version: String,
    pub os_image: String,
    pub container_runtime_version: String,
    pub kubelet_version: String,
    pub architecture: String,
}

/// Live figures of a node; memory in bytes, cpu in cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub cpu_capacity: i64,
    pub cpu_allocated: f64,
    pub cpu_usage: f64,
    pub memory_capacity: i64,
    pub memory_allocated: f64,
    pub memory_usage: f64,
    pub gpu_count: i32,
    pub gpu_core_total: f64,
    pub gpu_core_allocated: f64,
    pub gpu_core_usage: f64,
    pub gpu_memory_total: i64,
    pub gpu_memory_allocatable: i64,
    pub gpu_memory_allocated: i64,
    pub gpu_memory_usage: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusView {
    pub status: NodeConditionStatus,
    pub addresses: Vec<NodeAddress>,
    pub roles: Vec<Role>,
    pub system_info: NodeSystemInfo,
    #[serde(flatten)]
    pub metrics: NodeMetrics,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub metadata: ObjectMeta,
    pub spec: NodeSpecView,
    pub status: NodeStatusView,
}

/// Phase from the `Ready` condition.
pub fn node_phase(node: &Node) -> NodePhase {
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|cs| cs.iter().find(|c| c.type_ == "Ready"));
    match ready.map(|c| c.status.as_str()) {
        Some("True") => NodePhase::Ready,
        Some("False") => NodePhase::NotReady,
        Some(_) => NodePhase::Unknown,
        None => NodePhase::Unspecified,
    }
}

pub fn node_roles(node: &Node) -> Vec<Role> {
    let labels = node.metadata.labels.as_ref();
    let has = |key: &str| labels.is_some_and(|l| l.contains_key(key));

    let mut roles = Vec::new();
    if has(CONTROL_PLANE_LABEL_KEY) || has(MASTER_LABEL_KEY) {
        roles.push(Role::ControlPlane);
    }
    if has(WORKER_LABEL_KEY) || roles.is_empty() {
        roles.push(Role::Worker);
    }
    roles
}

/// Every address except the hostname.
pub fn node_addresses(node: &Node) -> Vec<NodeAddress> {
    node.status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .into_iter()
        .flatten()
        .filter(|a| a.type_ != "Hostname")
        .map(|a| NodeAddress {
            type_: a.type_.clone(),
            address: a.address.clone(),
        })
        .collect()
}

fn conditions(node: &Node, unschedulable: bool) -> Vec<NodeCondition> {
    let mut out: Vec<NodeCondition> = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .map(|c| NodeCondition {
            type_: c.type_.clone(),
            status: c.status.clone(),
            reason: c.reason.clone().unwrap_or_default(),
            message: c.message.clone().unwrap_or_default(),
            update_timestamp: c
                .last_heartbeat_time
                .as_ref()
                .map(|t| t.0.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        })
        .collect();

    out.push(NodeCondition {
        type_: SCHEDULING_DISABLED.to_string(),
        status: if unschedulable { "True" } else { "False" }.to_string(),
        reason: String::new(),
        message: format!("Node scheduling disabled: {}", unschedulable),
        update_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    out
}

impl NodeView {
    pub fn new(node: &Node, metrics: NodeMetrics) -> Self {
        let spec = node.spec.clone().unwrap_or_default();
        let unschedulable = spec.unschedulable.unwrap_or(false);
        let taints = spec
            .taints
            .unwrap_or_default()
            .into_iter()
            .map(|t| Taint {
                key: t.key,
                value: t.value.unwrap_or_default(),
                effect: t.effect,
            })
            .collect();

        let info = node
            .status
            .as_ref()
            .and_then(|s| s.node_info.as_ref())
            .map(|i| NodeSystemInfo {
                kernel_version: i.kernel_version.clone(),
                os_image: i.os_image.clone(),
                container_runtime_version: i.container_runtime_version.clone(),
                kubelet_version: i.kubelet_version.clone(),
                architecture: i.architecture.clone(),
            })
            .unwrap_or_default();

        Self {
            metadata: ObjectMeta::from(&node.metadata),
            spec: NodeSpecView {
                pod_cidr: spec.pod_cidr.unwrap_or_default(),
                unschedulable,
                taints,
            },
            status: NodeStatusView {
                status: NodeConditionStatus {
                    phase: node_phase(node),
                    conditions: conditions(node, unschedulable),
                },
                addresses: node_addresses(node),
                roles: node_roles(node),
                system_info: info,
                metrics,
            },
        }
    }
}

// ==================== GPU summary ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuNodeSummary {
    pub node: String,
    pub vgpu_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGpuSummary {
    pub summary: Vec<GpuNodeSummary>,
}

/// vGPU types of each ready node carrying the HAMi NVIDIA register annotation.
pub fn gpu_summary(nodes: &[Node]) -> ClusterGpuSummary {
    let summary = nodes
        .iter()
        .filter(|n| node_phase(n) == NodePhase::Ready)
        .filter_map(|n| {
            let raw = n.metadata.annotations.as_ref()?.get(NODE_NVIDIA_GPU_ANNOTATION)?;
            Some(GpuNodeSummary {
                node: n.metadata.name.clone().unwrap_or_default(),
                vgpu_types: nvidia_register_types(raw),
            })
        })
        .collect();
    ClusterGpuSummary { summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        NodeAddress as KubeNodeAddress, NodeCondition as KubeNodeCondition, NodeSpec, NodeStatus,
    };
    use std::collections::BTreeMap;

    fn node(name: &str, ready: &str, labels: &[&str]) -> Node {
        let mut n = Node::default();
        n.metadata.name = Some(name.into());
        n.metadata.labels = Some(labels.iter().map(|l| (l.to_string(), String::new())).collect());
        n.status = Some(NodeStatus {
            conditions: Some(vec![KubeNodeCondition {
                type_: "Ready".into(),
                status: ready.into(),
                ..Default::default()
            }]),
            addresses: Some(vec![
                KubeNodeAddress {
                    type_: "InternalIP".into(),
                    address: "10.0.0.1".into(),
                },
                KubeNodeAddress {
                    type_: "Hostname".into(),
                    address: name.into(),
                },
            ]),
            ..Default::default()
        });
        n
    }

    #[test]
    fn test_phase_from_ready_condition() {
        assert_eq!(node_phase(&node("a", "True", &[])), NodePhase::Ready);
        assert_eq!(node_phase(&node("a", "False", &[])), NodePhase::NotReady);
        assert_eq!(node_phase(&node("a", "Unknown", &[])), NodePhase::Unknown);
        assert_eq!(node_phase(&Node::default()), NodePhase::Unspecified);
    }

    #[test]
    fn test_roles_default_to_worker() {
        assert_eq!(node_roles(&node("a", "True", &[])), vec![Role::Worker]);
        assert_eq!(node_roles(&node("a", "True", &[MASTER_LABEL_KEY])), vec![Role::ControlPlane]);
        assert_eq!(
            node_roles(&node("a", "True", &[CONTROL_PLANE_LABEL_KEY, WORKER_LABEL_KEY])),
            vec![Role::ControlPlane, Role::Worker]
        );
    }

    #[test]
    fn test_view_skips_hostname_and_adds_scheduling_condition() {
        let mut n = node("gpu-1", "True", &[]);
        n.spec = Some(NodeSpec {
            unschedulable: Some(true),
            ..Default::default()
        });
        let view = NodeView::new(&n, NodeMetrics::default());
        assert_eq!(view.status.addresses, vec![NodeAddress { type_: "InternalIP".into(), address: "10.0.0.1".into() }]);
        let last = view.status.status.conditions.last().unwrap();
        assert_eq!(last.type_, "SchedulingDisabled");
        assert_eq!(last.status, "True");
    }

    #[test]
    fn test_gpu_summary_only_ready_registered_nodes() {
        let mut ready = node("a", "True", &[]);
        ready.metadata.annotations = Some(BTreeMap::from([(
            NODE_NVIDIA_GPU_ANNOTATION.to_string(),
            "GPU-1,10,32768,100,NVIDIA-A100,0,true:GPU-2,10,32768,100,NVIDIA-A100,0,true:".to_string(),
        )]));
        let mut down = node("b", "False", &[]);
        down.metadata.annotations = ready.metadata.annotations.clone();
        let bare = node("c", "True", &[]);

        let summary = gpu_summary(&[ready, down, bare]);
        assert_eq!(summary.summary.len(), 1);
        assert_eq!(summary.summary[0].vgpu_types, vec!["NVIDIA-A100", "NVIDIA-A100"]);
    }
}
