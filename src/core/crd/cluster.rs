use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::{is_condition_true, Condition};

pub const CONDITION_READY: &str = "Ready";

/// A member cluster registered in the local cluster.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "kantaloupe.dynamia.ai",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    status = "ClusterStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub provider: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalSecretReference>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prometheus_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway_address: String,
    #[serde(default)]
    pub cluster_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterStatus {
    pub kubernetes_version: String,
    pub kube_system_id: String,
    pub node_summary: Option<ResourceSummary>,
    pub pod_set_summary: Option<ResourceSummary>,
    pub kantaloupeflow_summary: Option<ResourceSummary>,
    pub resource_summary: Option<ClusterResourceSummary>,
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSummary {
    pub total_num: i32,
    pub ready_num: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterResourceSummary {
    pub allocatable: BTreeMap<String, Quantity>,
    pub allocating: BTreeMap<String, Quantity>,
    pub allocated: BTreeMap<String, Quantity>,
}

impl Cluster {
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| is_condition_true(&s.conditions, CONDITION_READY))
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_from_json() {
        let raw = serde_json::json!({
            "apiVersion": "kantaloupe.dynamia.ai/v1alpha1",
            "kind": "Cluster",
            "metadata": {"name": "alpha"},
            "spec": {
                "provider": "AWS",
                "type": "NVIDIA",
                "secretRef": {"namespace": "kantaloupe-system", "name": "alpha-secret"},
                "clusterId": "uid-1"
            },
            "status": {
                "kubernetesVersion": "v1.31.0",
                "conditions": [{"type": "Ready", "status": "True"}],
                "resourceSummary": {"allocatable": {"cpu": "8"}}
            }
        });
        let cluster: Cluster = serde_json::from_value(raw).unwrap();
        assert_eq!(cluster.spec.type_, "NVIDIA");
        assert_eq!(cluster.spec.secret_ref.as_ref().unwrap().name, "alpha-secret");
        assert!(cluster.is_ready());
    }

    #[test]
    fn test_not_ready_without_status() {
        let cluster = Cluster::new("beta", ClusterSpec::default());
        assert!(!cluster.is_ready());
        assert!(cluster.conditions().is_empty());
    }
}
