use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Accelerator vendor a member cluster is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterType {
    Nvidia,
    Metax,
    Ascend,
    Neuron,
}

impl ClusterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterType::Nvidia => "NVIDIA",
            ClusterType::Metax => "METAX",
            ClusterType::Ascend => "ASCEND",
            ClusterType::Neuron => "NEURON",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NVIDIA" => Some(ClusterType::Nvidia),
            "METAX" => Some(ClusterType::Metax),
            "ASCEND" => Some(ClusterType::Ascend),
            "NEURON" => Some(ClusterType::Neuron),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Running,
    Unhealth,
}

impl ClusterState {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterState::Running => "RUNNING",
            ClusterState::Unhealth => "UNHEALTH",
        }
    }
}

/// `?name=&type=&state=&provider=` on the cluster list. Empty or `*_UNSPECIFIED`
/// values do not filter.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFilter {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub cluster_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub provider: String,
}

/// The value to filter on, if any.
pub fn specified(value: &str) -> Option<&str> {
    if value.is_empty() || value.ends_with("UNSPECIFIED") || value == "UNSPECIFED" {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IntegrateClusterRequest {
    pub name: String,
    #[serde(default)]
    pub alias_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default, rename = "type")]
    pub cluster_type: Option<ClusterType>,
    #[serde(default)]
    pub kube_config: String,
    #[serde(default)]
    pub prometheus_address: String,
    #[serde(default)]
    pub gateway_address: String,
}

/// Fields left empty are kept as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClusterRequest {
    #[serde(default)]
    pub alias_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub kube_config: String,
    #[serde(default)]
    pub prometheus_address: String,
    #[serde(default)]
    pub gateway_address: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKubeconfigRequest {
    #[serde(default)]
    pub kubeconfig: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePrometheusRequest {
    #[validate(url)]
    pub prometheus_address: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSummaryQuery {
    /// Percent below which an allocated card counts as idle; defaults to 5.
    #[serde(default)]
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RankOption {
    #[default]
    #[serde(rename = "RANK_OPTION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "RANK_OPTION_CORE")]
    Core,
    #[serde(rename = "RANK_OPTION_MEMORY")]
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GpuTopQuery {
    #[serde(default)]
    pub rank_option: RankOption,
    #[serde(default)]
    pub topn: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_request_names() {
        let req: IntegrateClusterRequest = serde_json::from_value(serde_json::json!({
            "name": "alpha",
            "aliasName": "Alpha",
            "type": "NVIDIA",
            "provider": "AWS_EKS",
            "kubeConfig": "apiVersion: v1"
        }))
        .unwrap();
        assert_eq!(req.cluster_type, Some(ClusterType::Nvidia));
        assert_eq!(req.alias_name, "Alpha");
        assert!(req.labels.is_empty());
    }

    #[test]
    fn test_cluster_type_round_trip_names() {
        for t in [ClusterType::Nvidia, ClusterType::Metax, ClusterType::Ascend, ClusterType::Neuron] {
            assert_eq!(ClusterType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ClusterType::parse("CLUSTER_TYPE_UNSPECIFIED"), None);
    }

    #[test]
    fn test_prometheus_address_must_be_url() {
        let req = ValidatePrometheusRequest {
            prometheus_address: "not a url".into(),
        };
        assert!(req.validate().is_err());
    }
}
